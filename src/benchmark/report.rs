//! Text and JSON reports for aggregated metrics

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use super::metrics::{MetricsAccumulator, Outcome, OutcomeCounts, SliceDimension};
use crate::config::RunSettings;
use crate::predictions::write_json_pretty;

const NAME_WIDTH: usize = 35;

fn truncate(name: &str) -> String {
    name.chars().take(NAME_WIDTH).collect()
}

fn write_slice_table(out: &mut String, dimension: SliceDimension, slices: &indexmap::IndexMap<String, OutcomeCounts>) {
    let title = format!("┌─ BY {} ", dimension.title().to_uppercase());
    let _ = writeln!(out, "\n{}{}┐", title, "─".repeat(95usize.saturating_sub(title.chars().count())));
    let _ = writeln!(
        out,
        "{:35} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>9}",
        dimension.title(),
        "TP",
        "TN",
        "FP",
        "FN",
        "Unp.",
        "GenErr",
        "Total",
        "Accuracy"
    );
    let _ = writeln!(out, "{}", "─".repeat(96));

    if slices.is_empty() {
        let _ = writeln!(out, "{:35} {:>6}", "(none)", "-");
        return;
    }

    for (name, counts) in slices {
        let _ = writeln!(
            out,
            "{:35} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>8.1}%",
            truncate(name),
            counts.true_positive,
            counts.true_negative,
            counts.false_positive,
            counts.false_negative,
            counts.unparseable,
            counts.generation_error,
            counts.total(),
            counts.accuracy() * 100.0,
        );
    }
}

/// Render the overall counts followed by one table per slice dimension
pub fn format_report(metrics: &MetricsAccumulator) -> String {
    let overall = &metrics.overall;
    let mut out = String::new();

    let _ = writeln!(out, "╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║              NUMERIC ERROR DETECTION RESULTS                 ║");
    let _ = writeln!(out, "╚══════════════════════════════════════════════════════════════╝\n");

    let _ = writeln!(out, "Records processed: {}", metrics.records_processed());
    for outcome in Outcome::ALL {
        let count = overall.get(outcome);
        let _ = writeln!(
            out,
            "  {:12} {:>6}  ({:.3})",
            outcome.short_name(),
            count,
            overall.rate(count)
        );
    }
    if overall.generation_error > 0 {
        let _ = writeln!(out, "  of which generation errors: {}", overall.generation_error);
    }
    let _ = writeln!(out, "\nAccuracy:  {:.4}", overall.accuracy());
    let _ = writeln!(out, "Precision: {:.4}", overall.precision());
    let _ = writeln!(out, "Recall:    {:.4}", overall.recall());

    for dimension in SliceDimension::ALL {
        write_slice_table(&mut out, dimension, metrics.slice(dimension));
    }

    out
}

/// Persisted metrics with the settings that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub timestamp: String,
    /// Predictions file the metrics were computed from
    pub predictions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSettings>,
    pub accuracy: f32,
    pub metrics: MetricsAccumulator,
}

impl MetricsReport {
    pub fn new(predictions: &Path, run: Option<RunSettings>, metrics: MetricsAccumulator) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            predictions: predictions.display().to_string(),
            run,
            accuracy: metrics.overall.accuracy(),
            metrics,
        }
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{EvaluationItem, ExpectedLabel, PromptStyle};
    use crate::predictions::PredictionRecord;
    use indexmap::IndexMap;

    fn record(expected: ExpectedLabel, dataset: &str, raw: &str) -> PredictionRecord {
        PredictionRecord::from_response(
            EvaluationItem {
                prompt: "p".to_string(),
                expected_label: expected,
                dataset: dataset.to_string(),
                operation: "swap".to_string(),
                error_annotation: IndexMap::from([("Anomaly".to_string(), 1)]),
                passage: "x".to_string(),
                number: "1".to_string(),
                prompt_style: PromptStyle::ZeroShot,
            },
            raw,
        )
    }

    #[test]
    fn test_report_lists_every_slice() {
        let acc = MetricsAccumulator::from_records(&[
            record(ExpectedLabel::Affirmative, "DROP", "Yes"),
            record(ExpectedLabel::Negative, "GSM8K", "No"),
        ]);
        let text = format_report(&acc);

        assert!(text.contains("Records processed: 2"));
        assert!(text.contains("Accuracy:  1.0000"));
        assert!(text.contains("BY DATASET"));
        assert!(text.contains("BY OPERATION"));
        assert!(text.contains("BY ERROR TYPE"));
        assert!(text.contains("BY PROMPT TYPE"));
        assert!(text.contains("DROP"));
        assert!(text.contains("zero_shot"));
    }

    #[test]
    fn test_slice_rows_show_generation_errors() {
        let failed =
            PredictionRecord::generation_failure(record(ExpectedLabel::Affirmative, "GSM8K", "").item);
        let acc = MetricsAccumulator::from_records(&[
            record(ExpectedLabel::Negative, "DROP", "No"),
            failed,
        ]);
        let text = format_report(&acc);

        assert!(text.contains("GenErr"));
        let row = text.lines().find(|l| l.starts_with("GSM8K")).unwrap();
        let cells: Vec<&str> = row.split_whitespace().collect();
        // name, TP, TN, FP, FN, Unp., GenErr, Total, Accuracy
        assert_eq!(cells, vec!["GSM8K", "0", "0", "0", "0", "1", "1", "1", "0.0%"]);
    }

    #[test]
    fn test_long_slice_names_truncated() {
        let long = "ä".repeat(50);
        let acc = MetricsAccumulator::from_records(&[record(ExpectedLabel::Negative, &long, "No")]);
        let text = format_report(&acc);
        assert!(text.contains(&"ä".repeat(NAME_WIDTH)));
        assert!(!text.contains(&"ä".repeat(NAME_WIDTH + 1)));
    }

    #[test]
    fn test_empty_report() {
        let text = format_report(&MetricsAccumulator::new());
        assert!(text.contains("Records processed: 0"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn test_metrics_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let acc = MetricsAccumulator::from_records(&[
            record(ExpectedLabel::Affirmative, "DROP", "Yes"),
            record(ExpectedLabel::Negative, "DROP", "Yes"),
        ]);
        MetricsReport::new(Path::new("predictions.jsonl"), None, acc).save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["predictions"], "predictions.jsonl");
        assert!((json["accuracy"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(json["metrics"]["overall"]["false_positive"], 1);
        assert_eq!(json["metrics"]["by_dataset"]["DROP"]["true_positive"], 1);
        assert!(json.get("run").is_none());
    }
}
