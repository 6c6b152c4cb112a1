//! Yes/No response parsing
//!
//! Lower-case the text and test for the *substrings* "yes" then "no".
//! Matching is not word-bounded: "nobody knows" parses as no, "eyes" as yes.

use serde::{Deserialize, Serialize};

use crate::dataset::ExpectedLabel;

/// Raw output recorded when the model call itself failed
pub const GENERATION_ERROR_SENTINEL: &str = "generation_error";

/// Label derived from a model response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParsedLabel {
    #[serde(rename = "yes")]
    Affirmative,
    #[serde(rename = "no")]
    Negative,
    #[serde(rename = "unparseable", alias = "generation_error")]
    Unparseable,
}

impl ParsedLabel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Affirmative => "yes",
            Self::Negative => "no",
            Self::Unparseable => "unparseable",
        }
    }

    /// Whether this label agrees with the ground truth
    pub fn matches(&self, expected: ExpectedLabel) -> bool {
        matches!(
            (self, expected),
            (Self::Affirmative, ExpectedLabel::Affirmative) | (Self::Negative, ExpectedLabel::Negative)
        )
    }
}

/// Map raw model text to a label; "yes" wins when both substrings occur
pub fn parse_prediction(raw: &str) -> ParsedLabel {
    let lowered = raw.to_lowercase();
    if lowered.contains("yes") {
        ParsedLabel::Affirmative
    } else if lowered.contains("no") {
        ParsedLabel::Negative
    } else {
        tracing::debug!(response = %raw, "Unparseable response");
        ParsedLabel::Unparseable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_cases() {
        assert_eq!(parse_prediction("Yes, this is wrong"), ParsedLabel::Affirmative);
        assert_eq!(parse_prediction("No issues here"), ParsedLabel::Negative);
        assert_eq!(parse_prediction("maybe"), ParsedLabel::Unparseable);
    }

    #[test]
    fn test_yes_checked_before_no() {
        assert_eq!(parse_prediction("No, but yes kind of"), ParsedLabel::Affirmative);
    }

    #[test]
    fn test_substring_not_whole_word() {
        // "eyes" contains "yes"; "know" and "not" contain "no"
        assert_eq!(parse_prediction("my eyes"), ParsedLabel::Affirmative);
        assert_eq!(parse_prediction("I don't know"), ParsedLabel::Negative);
        assert_eq!(parse_prediction("NOT sure"), ParsedLabel::Negative);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(parse_prediction("YES"), ParsedLabel::Affirmative);
        assert_eq!(parse_prediction("\n\nNo.\n"), ParsedLabel::Negative);
    }

    #[test]
    fn test_sentinel_is_unparseable() {
        assert_eq!(parse_prediction(GENERATION_ERROR_SENTINEL), ParsedLabel::Unparseable);
        assert_eq!(parse_prediction(""), ParsedLabel::Unparseable);
    }

    #[test]
    fn test_matches() {
        assert!(ParsedLabel::Affirmative.matches(ExpectedLabel::Affirmative));
        assert!(ParsedLabel::Negative.matches(ExpectedLabel::Negative));
        assert!(!ParsedLabel::Negative.matches(ExpectedLabel::Affirmative));
        assert!(!ParsedLabel::Unparseable.matches(ExpectedLabel::Negative));
    }
}
