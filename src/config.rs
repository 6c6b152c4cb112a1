//! Configuration for the numeric-error benchmark
//!
//! Defines the model.toml schema and the SystemPromptStyle enum.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const FACT_CHECKER_PROMPT: &str = "### ROLE. You are an expert fact-checker specializing in numerical accuracy across biology, physics, history, mathematics, and everyday scenarios. \
### TASK. Determine if the given number contains a factual error within the provided context. \
### ANALYSIS PROCESS. Follow this reasoning sequence: \
1. CONTEXT ANALYSIS: Identify the domain and type of measurement being described \
2. GENERATED KNOWLEDGE: Recall established facts, typical ranges, and known standards for this specific domain and measurement type \
3. PLAUSIBILITY CHECK: Compare the number against expected ranges, physical laws, biological constraints, historical accuracy, and mathematical consistency \
4. ERROR DETECTION: Check for biological impossibilities, physical violations, historical inaccuracies, mathematical contradictions, or scale/magnitude errors. \
### OUTPUT. Answer must only be \"Yes\" or \"No\", do not provide explanations. Yes = Contains factual error, No = Factually accurate.";

const ANALYST_PROMPT: &str = "Roleplay: You are a professional analyst. Analyze the question the user provides and judge whether it is right or wrong.
Task: Based on the user's question, complete the following:
1. Using the information the user gives, decide whether the question contains a problem; answer yes if it does and no if it does not.
2. The output must be yes or no.";

/// Persona given to the model as the system prompt
///
/// - `FactChecker`: expert numerical fact-checker with a four-step analysis
/// - `Analyst`: short analyst persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemPromptStyle {
    #[default]
    FactChecker,
    Analyst,
}

impl SystemPromptStyle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FactChecker => "fact-checker",
            Self::Analyst => "analyst",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fact-checker" | "factchecker" | "fact_checker" | "expert" => Some(Self::FactChecker),
            "analyst" | "simple" => Some(Self::Analyst),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FactChecker => "Expert numerical fact-checker with structured analysis",
            Self::Analyst => "Short analyst persona answering yes/no",
        }
    }

    /// Full system prompt text
    pub fn text(&self) -> &'static str {
        match self {
            Self::FactChecker => FACT_CHECKER_PROMPT,
            Self::Analyst => ANALYST_PROMPT,
        }
    }
}

/// Hosted model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model ID sent to the API (e.g., "glm-4-flash")
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature (API default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff (API default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

fn default_model_name() -> String { "glm-4-flash".to_string() }
fn default_base_url() -> String { "https://open.bigmodel.cn/api/paas/v4".to_string() }
fn default_api_key_env() -> String { "ZHIPUAI_API_KEY".to_string() }

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
            top_p: None,
        }
    }
}

impl ModelSettings {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", self.api_key_env))
    }
}

/// System prompt selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Built-in persona
    #[serde(default)]
    pub system: SystemPromptStyle,

    /// Custom system prompt text; overrides `system` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_system: Option<String>,
}

impl PromptSettings {
    /// The system prompt to send with every request
    pub fn system_prompt(&self) -> &str {
        self.custom_system
            .as_deref()
            .unwrap_or_else(|| self.system.text())
    }

    /// One-line description for banners
    pub fn description(&self) -> &str {
        if self.custom_system.is_some() {
            "Custom system prompt from config"
        } else {
            self.system.description()
        }
    }

    /// Short label for reports
    pub fn label(&self) -> &str {
        if self.custom_system.is_some() {
            "custom"
        } else {
            self.system.name()
        }
    }
}

/// Benchmark configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub prompt: PromptSettings,
}

impl BenchConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse model config: {:?}", path))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        Ok(Self::default())
    }

    /// Apply command-line overrides; a built-in persona replaces any custom text
    pub fn with_overrides(mut self, model: Option<String>, system: Option<SystemPromptStyle>) -> Self {
        if let Some(name) = model {
            self.model.name = name;
        }
        if let Some(style) = system {
            self.prompt.system = style;
            self.prompt.custom_system = None;
        }
        self
    }
}

/// clap value parser for `--system-prompt`
pub fn parse_system_prompt(s: &str) -> std::result::Result<SystemPromptStyle, String> {
    SystemPromptStyle::from_str(s)
        .ok_or_else(|| format!("unknown system prompt '{}' (use fact-checker or analyst)", s))
}

/// Settings of a benchmark run, recorded alongside its metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Dataset path
    pub dataset: String,

    /// Model ID
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// System prompt label
    pub system_prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// First-N record limit, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Random sample size, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<usize>,

    /// Seed used for sampling
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_from_str() {
        assert_eq!(SystemPromptStyle::from_str("fact-checker"), Some(SystemPromptStyle::FactChecker));
        assert_eq!(SystemPromptStyle::from_str("Analyst"), Some(SystemPromptStyle::Analyst));
        assert_eq!(SystemPromptStyle::from_str("invalid"), None);
    }

    #[test]
    fn test_bench_config_default() {
        let config = BenchConfig::default();
        assert_eq!(config.model.name, "glm-4-flash");
        assert_eq!(config.prompt.system, SystemPromptStyle::FactChecker);
        assert!(config.model.temperature.is_none());
        assert!(config.prompt.system_prompt().starts_with("### ROLE."));
    }

    #[test]
    fn test_bench_config_toml() {
        let toml_str = r#"
[model]
name = "deepseek-chat"
base_url = "https://api.deepseek.com/v1"
api_key_env = "DEEPSEEK_API_KEY"
temperature = 0.3
top_p = 0.5

[prompt]
system = "analyst"
"#;
        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.name, "deepseek-chat");
        assert_eq!(config.model.temperature, Some(0.3));
        assert_eq!(config.model.top_p, Some(0.5));
        assert_eq!(config.prompt.system, SystemPromptStyle::Analyst);
        assert_eq!(config.prompt.label(), "analyst");
    }

    #[test]
    fn test_custom_system_prompt_overrides() {
        let toml_str = r#"
[prompt]
system = "analyst"
custom_system = "Reply Yes or No."
"#;
        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.prompt.system_prompt(), "Reply Yes or No.");
        assert_eq!(config.prompt.label(), "custom");
        // Missing [model] table falls back to defaults
        assert_eq!(config.model.api_key_env, "ZHIPUAI_API_KEY");
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = BenchConfig::load_or_default(Path::new("/nonexistent/model.toml")).unwrap();
        assert_eq!(config.model.name, "glm-4-flash");
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, "[model]\ntemperature = 0.3\n").unwrap();

        let loaded = BenchConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.model.temperature, Some(0.3));
        assert_eq!(loaded.prompt.system, SystemPromptStyle::FactChecker);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, "[model\n").unwrap();
        assert!(BenchConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let config: BenchConfig = toml::from_str("[prompt]\ncustom_system = \"Reply.\"\n").unwrap();
        assert_eq!(config.prompt.description(), "Custom system prompt from config");

        let config = config.with_overrides(Some("deepseek-chat".to_string()), Some(SystemPromptStyle::Analyst));
        assert_eq!(config.model.name, "deepseek-chat");
        assert_eq!(config.prompt.label(), "analyst");
        assert_eq!(config.prompt.description(), SystemPromptStyle::Analyst.description());
        assert!(config.prompt.system_prompt().starts_with("Roleplay:"));

        let unchanged = BenchConfig::default().with_overrides(None, None);
        assert_eq!(unchanged.model.name, "glm-4-flash");
    }

    #[test]
    fn test_parse_system_prompt() {
        assert_eq!(parse_system_prompt("analyst"), Ok(SystemPromptStyle::Analyst));
        assert!(parse_system_prompt("pirate").unwrap_err().contains("pirate"));
    }
}
