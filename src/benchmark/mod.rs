//! Benchmark infrastructure
//!
//! Runs evaluation items through a chat model and scores the answers.
//!
//! ## Usage
//!
//! ```bash
//! numeric-error-bench run --dataset ./annotated.json --limit 100
//! numeric-error-bench evaluate --predictions results/predictions.jsonl
//! ```
//!
//! ## Modules
//!
//! - `parser` - Yes/No response parsing
//! - `runner` - Sequential prediction loop over a chat backend
//! - `metrics` - Confusion counts, per-slice breakdowns, remediation list
//! - `report` - Text tables and metrics JSON

pub mod metrics;
pub mod parser;
pub mod report;
pub mod runner;


pub use metrics::{
    collect_remediation, MetricsAccumulator, Outcome, OutcomeCounts, RemediationEntry,
    SliceDimension,
};
pub use parser::{parse_prediction, ParsedLabel, GENERATION_ERROR_SENTINEL};
pub use report::{format_report, MetricsReport};
pub use runner::run_predictions;
