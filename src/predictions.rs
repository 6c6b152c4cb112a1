//! Prediction records and their on-disk formats
//!
//! A prediction record is an evaluation item plus the model's raw answer and
//! the label parsed from it. Records are written both as a pretty-printed JSON
//! array and as JSON Lines (one record per line, original order).
//!
//! ## Record Format
//!
//! ```json
//! {
//!   "prompt": "Answer with only 'Yes' or 'No'. ...",
//!   "expected_answer": "No",
//!   "dataset": "DROP",
//!   "operation": "+1",
//!   "error_annotation": {"Type Error": 1},
//!   "passage": "Spiders have 8 limbs.",
//!   "number": "8",
//!   "prompt_type": "zero_shot",
//!   "raw_prediction": "No",
//!   "parsed_prediction": "no",
//!   "generation_error": false
//! }
//! ```
//!
//! Files from older runs may lack `parsed_prediction` and `generation_error`;
//! both are re-derived from `raw_prediction` on load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::benchmark::parser::{parse_prediction, ParsedLabel, GENERATION_ERROR_SENTINEL};
use crate::dataset::EvaluationItem;

fn unparseable() -> ParsedLabel {
    ParsedLabel::Unparseable
}

/// An evaluation item with the model's answer attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(flatten)]
    pub item: EvaluationItem,
    /// Verbatim model output, or the generation-error sentinel
    pub raw_prediction: String,
    /// Label parsed from `raw_prediction`
    #[serde(default = "unparseable", alias = "parsel_prediction")]
    pub parsed_prediction: ParsedLabel,
    /// True iff the model call failed before producing text
    #[serde(default)]
    pub generation_error: bool,
}

impl PredictionRecord {
    /// Record a successful model response
    pub fn from_response(item: EvaluationItem, raw: impl Into<String>) -> Self {
        let raw_prediction = raw.into();
        let parsed_prediction = parse_prediction(&raw_prediction);
        Self {
            item,
            raw_prediction,
            parsed_prediction,
            generation_error: false,
        }
    }

    /// Record a failed model call
    pub fn generation_failure(item: EvaluationItem) -> Self {
        Self {
            item,
            raw_prediction: GENERATION_ERROR_SENTINEL.to_string(),
            parsed_prediction: ParsedLabel::Unparseable,
            generation_error: true,
        }
    }

    /// Re-derive the parsed label and generation-error flag from the raw text
    pub fn reparse(&mut self) {
        self.generation_error |= self.raw_prediction == GENERATION_ERROR_SENTINEL;
        self.parsed_prediction = if self.generation_error {
            ParsedLabel::Unparseable
        } else {
            parse_prediction(&self.raw_prediction)
        };
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Write any serializable value as pretty JSON, creating parent directories
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(())
}

/// Save records as a pretty-printed JSON array
pub fn save_json(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    write_json_pretty(path, records)
}

/// Save records as JSON Lines, one record per line
pub fn save_jsonl(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record).context("Failed to serialize record")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Load records from JSON Lines; blank lines are ignored
pub fn load_jsonl(path: &Path) -> Result<Vec<PredictionRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open predictions: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut record: PredictionRecord = serde_json::from_str(&line).with_context(|| {
            format!("Failed to parse record on line {} of {}", line_no + 1, path.display())
        })?;
        record.reparse();
        records.push(record);
    }
    Ok(records)
}

/// Load records from a JSON array file
pub fn load_json(path: &Path) -> Result<Vec<PredictionRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read predictions: {}", path.display()))?;
    let mut records: Vec<PredictionRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse predictions: {}", path.display()))?;
    records.iter_mut().for_each(PredictionRecord::reparse);
    Ok(records)
}

/// Load records, choosing the format from the file extension (`.json` → array, else JSONL)
pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => load_jsonl(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ExpectedLabel, PromptStyle};
    use indexmap::IndexMap;

    fn item(expected: ExpectedLabel) -> EvaluationItem {
        EvaluationItem {
            prompt: "Is \"8\" an error?".to_string(),
            expected_label: expected,
            dataset: "d1".to_string(),
            operation: "+1".to_string(),
            error_annotation: IndexMap::from([("Type Error".to_string(), 1)]),
            passage: "Spiders have 8 limbs.".to_string(),
            number: "8".to_string(),
            prompt_style: PromptStyle::ZeroShot,
        }
    }

    #[test]
    fn test_from_response_parses() {
        let r = PredictionRecord::from_response(item(ExpectedLabel::Negative), "No.");
        assert_eq!(r.parsed_prediction, ParsedLabel::Negative);
        assert!(!r.generation_error);
    }

    #[test]
    fn test_generation_failure() {
        let r = PredictionRecord::generation_failure(item(ExpectedLabel::Affirmative));
        assert_eq!(r.raw_prediction, GENERATION_ERROR_SENTINEL);
        assert_eq!(r.parsed_prediction, ParsedLabel::Unparseable);
        assert!(r.generation_error);
    }

    #[test]
    fn test_jsonl_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/predictions.jsonl");
        let records = vec![
            PredictionRecord::from_response(item(ExpectedLabel::Negative), "No"),
            PredictionRecord::from_response(item(ExpectedLabel::Affirmative), "Yes"),
            PredictionRecord::generation_failure(item(ExpectedLabel::Affirmative)),
        ];
        save_jsonl(&path, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_json_array_roundtrip_via_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let records = vec![PredictionRecord::from_response(item(ExpectedLabel::Negative), "no")];
        save_json(&path, &records).unwrap();
        assert_eq!(load_predictions(&path).unwrap(), records);
    }

    #[test]
    fn test_legacy_record_is_reparsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.jsonl");
        let lines = [
            r#"{"prompt": "p", "expected_answer": "Yes", "dataset": "DROP", "operation": "swap", "error_annotation": {"Anomaly": 1}, "passage": "x", "number": "3", "prompt_type": "few_shot", "raw_prediction": "Yes"}"#,
            "",
            r#"{"prompt": "p", "expected_answer": "No", "dataset": "DROP", "operation": "swap", "error_annotation": {}, "passage": "x", "number": "3", "prompt_type": "zero_shot", "raw_prediction": "generation_error", "parsel_prediction": "generation_error"}"#,
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].parsed_prediction, ParsedLabel::Affirmative);
        assert_eq!(loaded[0].item.prompt_style, PromptStyle::FewShot);
        assert!(loaded[1].generation_error);
        assert_eq!(loaded[1].parsed_prediction, ParsedLabel::Unparseable);
    }

    #[test]
    fn test_legacy_numeric_number_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy_numeric.jsonl");
        std::fs::write(
            &path,
            r#"{"prompt": "p", "expected_answer": "Yes", "dataset": "DROP", "operation": "+1", "error_annotation": {"Type Error": 1}, "passage": "Spiders have 9 limbs.", "number": 9, "prompt_type": "zero_shot", "raw_prediction": "Yes"}"#,
        )
        .unwrap();

        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].item.number, "9");
        assert_eq!(loaded[0].parsed_prediction, ParsedLabel::Affirmative);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"prompt\": 1}\n").unwrap();
        let err = load_jsonl(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }
}
