//! Dataset loader for numeric-error benchmarks
//!
//! Turns an annotated dataset into a flat list of evaluation items.
//!
//! ## Dataset Format (JSON)
//!
//! The top-level value is an object mapping arbitrary keys to records. Key order
//! is preserved and defines the record stream.
//!
//! ```json
//! {
//!   "0": {
//!     "correct_number": "8",
//!     "correct_passage": "Spiders have 8 limbs.",
//!     "error_number": "9",
//!     "error_passage": "Spiders have 9 limbs.",
//!     "dataset": "d1",
//!     "operation": "+1",
//!     "error_annotation": {"Factual Error": 1, "Anomaly": 0}
//!   }
//! }
//! ```
//!
//! Each record yields two items: the correct instance (expected "No") followed by
//! the error instance (expected "Yes").

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::prompts::{few_shot_prompt, uses_few_shot, zero_shot_prompt};

/// Fields every record must carry
pub const REQUIRED_FIELDS: [&str; 6] = [
    "correct_number",
    "correct_passage",
    "error_number",
    "error_passage",
    "dataset",
    "operation",
];

/// Ground truth for an item: does the number contain an error?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedLabel {
    #[serde(rename = "Yes", alias = "yes")]
    Affirmative,
    #[serde(rename = "No", alias = "no")]
    Negative,
}

impl ExpectedLabel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Affirmative => "Yes",
            Self::Negative => "No",
        }
    }
}

/// Prompt template used for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    ZeroShot,
    FewShot,
}

impl PromptStyle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZeroShot => "zero_shot",
            Self::FewShot => "few_shot",
        }
    }

    /// Style for the record at `position` in the source stream
    pub fn for_position(position: usize) -> Self {
        if uses_few_shot(position) {
            Self::FewShot
        } else {
            Self::ZeroShot
        }
    }

    /// Render this style's template
    pub fn render(&self, passage: &str, number: &str) -> String {
        match self {
            Self::ZeroShot => zero_shot_prompt(passage, number),
            Self::FewShot => few_shot_prompt(passage, number),
        }
    }
}

/// One question posed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    /// Rendered prompt text
    pub prompt: String,
    /// Whether the number is an inserted error
    #[serde(rename = "expected_answer")]
    pub expected_label: ExpectedLabel,
    /// Dataset source tag
    pub dataset: String,
    /// Numeric perturbation tag (e.g. "*2", "swap")
    pub operation: String,
    /// Error-type name → count; a type is active iff its count > 0
    #[serde(default)]
    pub error_annotation: IndexMap<String, i64>,
    /// Passage the prompt was built from
    #[serde(default, deserialize_with = "string_or_number")]
    pub passage: String,
    /// Number the prompt asks about
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: String,
    /// Template the prompt was rendered with
    #[serde(rename = "prompt_type")]
    pub prompt_style: PromptStyle,
}

impl EvaluationItem {
    /// Error types with a positive count, in annotation order
    pub fn active_error_types(&self) -> impl Iterator<Item = &str> {
        self.error_annotation
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(name, _)| name.as_str())
    }
}

/// A record with all required fields present
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub correct_number: String,
    pub correct_passage: String,
    pub error_number: String,
    pub error_passage: String,
    pub dataset: String,
    pub operation: String,
    pub error_annotation: IndexMap<String, i64>,
}

/// Text of a scalar field; numbers keep their JSON spelling
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accept a JSON string or number; null reads as empty
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        other => field_text(&other).ok_or_else(|| {
            serde::de::Error::custom(format!("expected a string or number, found {}", other))
        }),
    }
}

/// Count for one annotation entry
///
/// Fractional counts round away from zero so a positive count stays active.
fn annotation_count(name: &str, count: &Value) -> Option<i64> {
    if let Some(n) = count.as_i64() {
        return Some(n);
    }
    match count.as_f64() {
        Some(f) => {
            tracing::warn!(error_type = %name, count = f, "Non-integer annotation count");
            Some(if f > 0.0 { f.ceil() as i64 } else { f.floor() as i64 })
        }
        None => {
            tracing::warn!(error_type = %name, count = %count, "Ignoring non-numeric annotation count");
            None
        }
    }
}

fn parse_annotation(value: Option<&Value>) -> IndexMap<String, i64> {
    let Some(Value::Object(map)) = value else {
        return IndexMap::new();
    };
    map.iter()
        .filter_map(|(name, count)| Some((name.clone(), annotation_count(name, count)?)))
        .collect()
}

impl RawRecord {
    /// Extract a record, or return the names of missing/invalid required fields
    pub fn from_value(value: &Value) -> std::result::Result<Self, Vec<&'static str>> {
        let get = |field: &str| value.get(field).and_then(field_text);

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| get(*f).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        // All required fields verified above
        let take = |field: &str| get(field).unwrap_or_default();
        Ok(Self {
            correct_number: take("correct_number"),
            correct_passage: take("correct_passage"),
            error_number: take("error_number"),
            error_passage: take("error_passage"),
            dataset: take("dataset"),
            operation: take("operation"),
            error_annotation: parse_annotation(value.get("error_annotation")),
        })
    }

    /// The correct/error item pair for this record
    pub fn to_items(&self, style: PromptStyle) -> [EvaluationItem; 2] {
        let item = |passage: &str, number: &str, expected_label: ExpectedLabel| EvaluationItem {
            prompt: style.render(passage, number),
            expected_label,
            dataset: self.dataset.clone(),
            operation: self.operation.clone(),
            error_annotation: self.error_annotation.clone(),
            passage: passage.to_string(),
            number: number.to_string(),
            prompt_style: style,
        };
        [
            item(&self.correct_passage, &self.correct_number, ExpectedLabel::Negative),
            item(&self.error_passage, &self.error_number, ExpectedLabel::Affirmative),
        ]
    }
}

/// Items built from a dataset
#[derive(Debug, Clone, Default)]
pub struct LoadedItems {
    /// Flat item list, two per accepted record
    pub items: Vec<EvaluationItem>,
    /// Keys of records skipped for missing fields
    pub skipped: Vec<String>,
    /// Number of accepted records rendered few-shot
    pub few_shot_records: usize,
}

/// An annotated dataset in source order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// (key, raw record) pairs
    pub records: Vec<(String, Value)>,
}

impl Dataset {
    /// Load a dataset from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse dataset: {}", path.display()))
    }

    /// Parse a dataset from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let map: IndexMap<String, Value> = serde_json::from_str(content)
            .context("Dataset must be a JSON object of records")?;
        if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_object()) {
            anyhow::bail!("Dataset record {:?} is not a JSON object", key);
        }
        Ok(Self {
            records: map.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only the first `limit` records
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.records.truncate(limit);
        self
    }

    /// Keep `amount` records picked uniformly with a seeded RNG, in source order
    pub fn with_sample(self, amount: usize, seed: u64) -> Self {
        let len = self.records.len();
        let amount = amount.min(len);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut keep = vec![false; len];
        for idx in rand::seq::index::sample(&mut rng, len, amount).into_vec() {
            keep[idx] = true;
        }

        let records = self
            .records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, keep)| keep.then_some(record))
            .collect();
        Self { records }
    }

    /// Build evaluation items from the record stream
    ///
    /// Records missing a required field are skipped entirely but still occupy
    /// their stream position, so few-shot selection of later records does not shift.
    pub fn build_items(&self) -> LoadedItems {
        let mut loaded = LoadedItems {
            items: Vec::with_capacity(self.records.len() * 2),
            ..Default::default()
        };

        for (position, (key, value)) in self.records.iter().enumerate() {
            let record = match RawRecord::from_value(value) {
                Ok(record) => record,
                Err(missing) => {
                    let label = value
                        .get("id")
                        .and_then(field_text)
                        .unwrap_or_else(|| key.clone());
                    tracing::warn!(
                        record = %label,
                        missing = ?missing,
                        "Skipping record with missing fields"
                    );
                    loaded.skipped.push(key.clone());
                    continue;
                }
            };

            let style = PromptStyle::for_position(position);
            if style == PromptStyle::FewShot {
                loaded.few_shot_records += 1;
            }
            loaded.items.extend(record.to_items(style));
        }

        tracing::info!(
            records = self.records.len(),
            items = loaded.items.len(),
            skipped = loaded.skipped.len(),
            "Built evaluation items"
        );
        loaded
    }
}
