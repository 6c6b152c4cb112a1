//! Confusion-matrix metrics for numeric-error detection
//!
//! Every prediction record is classified into one outcome, which is counted
//! globally and in each slice the record belongs to.
//!
//! ## Outcomes
//!
//! | expected | parsed      | outcome     |
//! |----------|-------------|-------------|
//! | Yes      | yes         | TP          |
//! | No       | no          | TN          |
//! | No       | yes         | FP          |
//! | Yes      | no          | FN          |
//! | any      | unparseable | Unparseable |
//!
//! ## Slices
//!
//! Dataset, operation and prompt style each place a record in exactly one
//! slice. Error type places it in one slice per *active* error type, so a
//! record annotated with two types is counted in both.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::parser::ParsedLabel;
use crate::dataset::ExpectedLabel;
use crate::predictions::PredictionRecord;

/// Classification outcome of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
    Unparseable,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::TruePositive,
        Outcome::TrueNegative,
        Outcome::FalsePositive,
        Outcome::FalseNegative,
        Outcome::Unparseable,
    ];

    /// Classify a parsed label against the ground truth
    pub fn classify(expected: ExpectedLabel, parsed: ParsedLabel) -> Self {
        match (expected, parsed) {
            (_, ParsedLabel::Unparseable) => Self::Unparseable,
            (ExpectedLabel::Affirmative, ParsedLabel::Affirmative) => Self::TruePositive,
            (ExpectedLabel::Negative, ParsedLabel::Negative) => Self::TrueNegative,
            (ExpectedLabel::Affirmative, ParsedLabel::Negative) => Self::FalseNegative,
            (ExpectedLabel::Negative, ParsedLabel::Affirmative) => Self::FalsePositive,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::TruePositive => "TP",
            Self::TrueNegative => "TN",
            Self::FalsePositive => "FP",
            Self::FalseNegative => "FN",
            Self::Unparseable => "Unparseable",
        }
    }
}

/// Counters for each outcome
///
/// `generation_error` is a subset of `unparseable`: records whose model call
/// failed outright rather than returning text without yes/no.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub true_positive: usize,
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub unparseable: usize,
    pub generation_error: usize,
}

impl OutcomeCounts {
    /// Count one outcome
    pub fn add(&mut self, outcome: Outcome, generation_error: bool) {
        match outcome {
            Outcome::TruePositive => self.true_positive += 1,
            Outcome::TrueNegative => self.true_negative += 1,
            Outcome::FalsePositive => self.false_positive += 1,
            Outcome::FalseNegative => self.false_negative += 1,
            Outcome::Unparseable => {
                self.unparseable += 1;
                if generation_error {
                    self.generation_error += 1;
                }
            }
        }
    }

    pub fn get(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::TruePositive => self.true_positive,
            Outcome::TrueNegative => self.true_negative,
            Outcome::FalsePositive => self.false_positive,
            Outcome::FalseNegative => self.false_negative,
            Outcome::Unparseable => self.unparseable,
        }
    }

    /// TP + TN + FP + FN + Unparseable
    pub fn total(&self) -> usize {
        self.true_positive
            + self.true_negative
            + self.false_positive
            + self.false_negative
            + self.unparseable
    }

    /// (TP + TN) / total, 0 when empty
    pub fn accuracy(&self) -> f32 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// TP / (TP + FP), 0 when nothing was predicted positive
    pub fn precision(&self) -> f32 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// TP / (TP + FN), 0 when nothing was actually positive
    pub fn recall(&self) -> f32 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// Fraction of all counted records
    pub fn rate(&self, count: usize) -> f32 {
        ratio(count, self.total())
    }

    /// Field-wise sum
    pub fn merge(&mut self, other: &Self) {
        self.true_positive += other.true_positive;
        self.true_negative += other.true_negative;
        self.false_positive += other.false_positive;
        self.false_negative += other.false_negative;
        self.unparseable += other.unparseable;
        self.generation_error += other.generation_error;
    }

    /// Format as a summary string
    pub fn format_summary(&self) -> String {
        format!(
            "TP: {} | TN: {} | FP: {} | FN: {} | Unparseable: {} (gen err: {}) | Acc: {:.3}",
            self.true_positive,
            self.true_negative,
            self.false_positive,
            self.false_negative,
            self.unparseable,
            self.generation_error,
            self.accuracy()
        )
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// A breakdown dimension for per-slice metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceDimension {
    Dataset,
    Operation,
    ErrorType,
    PromptStyle,
}

impl SliceDimension {
    pub const ALL: [SliceDimension; 4] = [
        SliceDimension::Dataset,
        SliceDimension::Operation,
        SliceDimension::ErrorType,
        SliceDimension::PromptStyle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Operation => "operation",
            Self::ErrorType => "error_type",
            Self::PromptStyle => "prompt_style",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Dataset => "Dataset",
            Self::Operation => "Operation",
            Self::ErrorType => "Error Type",
            Self::PromptStyle => "Prompt Type",
        }
    }
}

/// Global and per-slice outcome counters
///
/// Slice maps keep keys in first-seen order. Two accumulators built from
/// disjoint shards can be merged; the result equals aggregating the
/// concatenated shards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsAccumulator {
    pub overall: OutcomeCounts,
    pub by_dataset: IndexMap<String, OutcomeCounts>,
    pub by_operation: IndexMap<String, OutcomeCounts>,
    pub by_error_type: IndexMap<String, OutcomeCounts>,
    pub by_prompt_style: IndexMap<String, OutcomeCounts>,
}

fn bump(map: &mut IndexMap<String, OutcomeCounts>, key: &str, outcome: Outcome, generation_error: bool) {
    match map.get_mut(key) {
        Some(counts) => counts.add(outcome, generation_error),
        None => {
            let mut counts = OutcomeCounts::default();
            counts.add(outcome, generation_error);
            map.insert(key.to_string(), counts);
        }
    }
}

fn merge_slices(into: &mut IndexMap<String, OutcomeCounts>, from: &IndexMap<String, OutcomeCounts>) {
    for (key, counts) in from {
        into.entry(key.clone()).or_default().merge(counts);
    }
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a sequence of records
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let mut acc = Self::new();
        for record in records {
            acc.record(record);
        }
        acc
    }

    /// Count one record globally and in every slice it belongs to
    pub fn record(&mut self, record: &PredictionRecord) -> Outcome {
        let item = &record.item;
        let outcome = Outcome::classify(item.expected_label, record.parsed_prediction);
        let gen_err = record.generation_error;

        self.overall.add(outcome, gen_err);
        bump(&mut self.by_dataset, &item.dataset, outcome, gen_err);
        bump(&mut self.by_operation, &item.operation, outcome, gen_err);
        bump(&mut self.by_prompt_style, item.prompt_style.name(), outcome, gen_err);
        for error_type in item.active_error_types() {
            bump(&mut self.by_error_type, error_type, outcome, gen_err);
        }

        outcome
    }

    /// Field-wise sum with another accumulator
    pub fn merge(&mut self, other: &Self) {
        self.overall.merge(&other.overall);
        merge_slices(&mut self.by_dataset, &other.by_dataset);
        merge_slices(&mut self.by_operation, &other.by_operation);
        merge_slices(&mut self.by_error_type, &other.by_error_type);
        merge_slices(&mut self.by_prompt_style, &other.by_prompt_style);
    }

    /// Per-slice counters for one dimension
    pub fn slice(&self, dimension: SliceDimension) -> &IndexMap<String, OutcomeCounts> {
        match dimension {
            SliceDimension::Dataset => &self.by_dataset,
            SliceDimension::Operation => &self.by_operation,
            SliceDimension::ErrorType => &self.by_error_type,
            SliceDimension::PromptStyle => &self.by_prompt_style,
        }
    }

    /// Number of records counted
    pub fn records_processed(&self) -> usize {
        self.overall.total()
    }
}

/// An expected-error record the model could not be scored on, kept for manual follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationEntry {
    pub error_number: String,
    pub error_passage: String,
    pub dataset: String,
    pub operation: String,
    /// Active error types only
    pub error_annotation: IndexMap<String, i64>,
    /// Paired correct number; left empty for manual completion
    pub correct_number: String,
    /// Paired correct passage; left empty for manual completion
    pub correct_passage: String,
}

/// Collect records expected "Yes" whose answer could not be parsed
///
/// Keys are `unparsed_{i}` where `i` is the record's position in `records`.
pub fn collect_remediation(records: &[PredictionRecord]) -> IndexMap<String, RemediationEntry> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.item.expected_label == ExpectedLabel::Affirmative
                && r.parsed_prediction == ParsedLabel::Unparseable
        })
        .map(|(idx, r)| {
            let entry = RemediationEntry {
                error_number: r.item.number.clone(),
                error_passage: r.item.passage.clone(),
                dataset: r.item.dataset.clone(),
                operation: r.item.operation.clone(),
                error_annotation: r
                    .item
                    .error_annotation
                    .iter()
                    .filter(|(_, count)| **count > 0)
                    .map(|(name, count)| (name.clone(), *count))
                    .collect(),
                correct_number: String::new(),
                correct_passage: String::new(),
            };
            (format!("unparsed_{}", idx), entry)
        })
        .collect()
}
