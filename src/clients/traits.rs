//! Chat backend trait abstraction
//!
//! Defines the single operation the benchmark needs from a hosted model:
//! answer one user prompt under a fixed system prompt.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Description of a configured backend, echoed into reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Human-readable name for this configuration
    pub name: String,
    /// Backend type (e.g. "openai-compatible")
    pub backend: String,
    /// Model identifier sent to the API
    pub model: String,
    /// Additional notes
    pub notes: Option<String>,
}

/// Unified trait for chat-completion backends
///
/// Implementations are constructed once and injected into the runner. A call
/// that fails returns `Err`; the runner records it as a generation error and
/// moves on to the next item.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the configuration for this backend
    fn config(&self) -> &BackendConfig;

    /// Get the name of this backend configuration
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Complete one exchange and return the response text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Remove Markdown code fences some models wrap around short answers
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```python", "")
        .replace("```json", "")
        .replace("```", "")
}
