//! Chat backends abstraction
//!
//! Provides a unified trait for hosted chat models:
//! - OpenAI-compatible chat completions (reqwest)

pub mod openai_backend;
pub mod traits;

pub use openai_backend::OpenAiCompatibleBackend;
pub use traits::{strip_code_fences, BackendConfig, ChatBackend};
