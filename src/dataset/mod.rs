//! Dataset loading and prompt rendering
//!
//! ```rust,ignore
//! use dataset::Dataset;
//!
//! let dataset = Dataset::load(&path)?.with_limit(100);
//! let loaded = dataset.build_items();
//! ```
//!
//! Every 48th record (by zero-based position) is rendered with the few-shot
//! template; all others are zero-shot.

pub mod loader;
pub mod prompts;

pub use loader::{
    Dataset, EvaluationItem, ExpectedLabel, LoadedItems, PromptStyle, RawRecord,
    REQUIRED_FIELDS,
};
pub use prompts::{few_shot_prompt, zero_shot_prompt, FEW_SHOT_EXAMPLES, FEW_SHOT_EVERY};
