//! OpenAI-compatible chat completions backend
//!
//! Works with any provider exposing `POST {base_url}/chat/completions` with
//! bearer authentication (Zhipu GLM, DeepSeek, OpenAI, vLLM, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::traits::{strip_code_fences, BackendConfig, ChatBackend};
use crate::config::ModelSettings;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat backend speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatibleBackend {
    config: BackendConfig,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
}

impl OpenAiCompatibleBackend {
    /// Create a backend, reading the API key from the configured environment variable
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let api_key = settings.api_key()?;
        Self::with_api_key(settings, api_key)
    }

    /// Create a backend with an explicit API key
    pub fn with_api_key(settings: &ModelSettings, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("numeric-error-bench/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));

        tracing::info!(model = %settings.name, endpoint = %endpoint, "Initialized chat backend");

        Ok(Self {
            config: BackendConfig {
                name: settings.name.clone(),
                backend: "openai-compatible".to_string(),
                model: settings.name.clone(),
                notes: None,
            },
            client,
            endpoint,
            api_key: api_key.into(),
            temperature: settings.temperature,
            top_p: settings.top_p,
        })
    }

    /// Full URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.config.model, chars = user_prompt.len(), "Sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(system_prompt, user_prompt))
            .send()
            .await
            .context("Chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API returned {}: {}", status, body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode chat response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No content in chat response"))?;

        Ok(strip_code_fences(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ModelSettings {
        ModelSettings {
            base_url: "https://example.invalid/v4/".to_string(),
            temperature: Some(0.3),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let backend = OpenAiCompatibleBackend::with_api_key(&settings(), "key").unwrap();
        assert_eq!(backend.endpoint(), "https://example.invalid/v4/chat/completions");
        assert_eq!(backend.name(), "glm-4-flash");
    }

    #[test]
    fn test_request_body_shape() {
        let backend = OpenAiCompatibleBackend::with_api_key(&settings(), "key").unwrap();
        let body = serde_json::to_value(backend.request("sys", "user")).unwrap();
        assert_eq!(body["model"], "glm-4-flash");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert!(body.get("top_p").is_none());
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_missing_api_key_env() {
        let settings = ModelSettings {
            api_key_env: "NUMERIC_ERROR_BENCH_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(OpenAiCompatibleBackend::new(&settings).is_err());
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "```\nYes\n```"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let content = parsed.choices[0].message.content.clone().unwrap();
        assert_eq!(strip_code_fences(&content), "\nYes\n");
    }

    #[tokio::test]
    #[ignore] // Requires network access and an API key
    async fn test_live_completion() {
        let backend = OpenAiCompatibleBackend::new(&ModelSettings::default()).unwrap();
        let text = backend
            .complete("Answer Yes or No.", "Is 2 + 2 = 5?")
            .await
            .unwrap();
        assert!(!text.is_empty());
    }
}
