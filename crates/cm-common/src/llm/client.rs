//! Client for the external inference API (chat completions + embeddings,
//! OpenAI-compatible wire shape).
//!
//! The client is constructed once and injected into the adapters; required
//! credentials are validated at construction so a misconfigured deployment
//! fails at startup instead of on the first scored application.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference configuration error: {0}")]
    Configuration(String),
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("inference response contained no usable content")]
    MissingContent,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            timeout_secs: 30,
        }
    }
}

impl InferenceConfig {
    /// Read configuration from the environment. `CM_INFERENCE_API_KEY` wins,
    /// `OPENAI_API_KEY` is accepted as the provider-specific fallback.
    pub fn from_env() -> Result<Self, InferenceError> {
        let api_key = std::env::var("CM_INFERENCE_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        let defaults = Self::default();

        Ok(Self {
            api_key,
            base_url: std::env::var("CM_INFERENCE_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            chat_model: std::env::var("CM_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: std::env::var("CM_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            timeout_secs: std::env::var("CM_INFERENCE_TIMEOUT_SECONDS")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    config: InferenceConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::Configuration(
                "CM_INFERENCE_API_KEY (or OPENAI_API_KEY) is required".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, InferenceError> {
        Self::new(InferenceConfig::from_env()?)
    }

    /// Identifier persisted as `model_used` on every score for auditability.
    pub fn model_identifier(&self) -> String {
        format!("{}+{}", self.config.chat_model, self.config.embedding_model)
    }

    /// One chat completion restricted to JSON output; returns the raw
    /// message content.
    #[instrument(skip_all)]
    pub async fn chat_completion(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status, "chat completion request rejected");
            return Err(InferenceError::Api { status, message });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(InferenceError::MissingContent)
    }

    /// Embed all inputs in one batched call, preserving input order.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn create_embeddings(
        &self,
        inputs: &[&str],
    ) -> Result<Vec<Vec<f32>>, InferenceError> {
        let request = EmbeddingsRequest {
            model: &self.config.embedding_model,
            input: inputs,
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status, "embeddings request rejected");
            return Err(InferenceError::Api { status, message });
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.len() != inputs.len() {
            return Err(InferenceError::MissingContent);
        }

        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_GUARD.lock().unwrap();

        let previous: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let old = std::env::var(key).ok();
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
                (key.to_string(), old)
            })
            .collect();

        f();

        for (key, old) in previous {
            match old {
                Some(v) => std::env::set_var(&key, v),
                None => std::env::remove_var(&key),
            }
        }
    }

    #[test]
    fn from_env_prefers_dedicated_key_over_provider_key() {
        with_env(
            &[
                ("CM_INFERENCE_API_KEY", Some("primary")),
                ("OPENAI_API_KEY", Some("fallback")),
            ],
            || {
                let config = InferenceConfig::from_env().unwrap();
                assert_eq!(config.api_key, "primary");
            },
        );
    }

    #[test]
    fn from_env_falls_back_to_provider_key() {
        with_env(
            &[
                ("CM_INFERENCE_API_KEY", None),
                ("OPENAI_API_KEY", Some("provider-secret")),
            ],
            || {
                let config = InferenceConfig::from_env().unwrap();
                assert_eq!(config.api_key, "provider-secret");
            },
        );
    }

    #[test]
    fn from_env_reads_overrides_and_trims_base_url() {
        with_env(
            &[
                ("CM_INFERENCE_API_KEY", Some("k")),
                ("CM_INFERENCE_BASE_URL", Some("https://llm.internal/v1/")),
                ("CM_CHAT_MODEL", Some("gpt-4o")),
                ("CM_EMBEDDING_MODEL", Some("text-embedding-3-large")),
                ("CM_INFERENCE_TIMEOUT_SECONDS", Some("45")),
            ],
            || {
                let config = InferenceConfig::from_env().unwrap();
                assert_eq!(config.base_url, "https://llm.internal/v1");
                assert_eq!(config.chat_model, "gpt-4o");
                assert_eq!(config.embedding_model, "text-embedding-3-large");
                assert_eq!(config.timeout_secs, 45);
            },
        );
    }

    #[test]
    fn construction_requires_credentials() {
        let config = InferenceConfig {
            api_key: "  ".into(),
            ..InferenceConfig::default()
        };

        let err = InferenceClient::new(config).unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
    }

    #[test]
    fn model_identifier_names_both_models() {
        let config = InferenceConfig {
            api_key: "k".into(),
            ..InferenceConfig::default()
        };
        let client = InferenceClient::new(config).unwrap();
        assert_eq!(
            client.model_identifier(),
            "gpt-4o-mini+text-embedding-3-small"
        );
    }

    #[test]
    fn chat_response_content_deserializes() {
        let raw = r#"{"choices":[{"message":{"content":"{\"ok\":true}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"ok\":true}")
        );
    }

    #[test]
    fn embedding_rows_reorder_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[0.5]},
            {"index":0,"embedding":[0.25]}
        ]}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        assert_eq!(rows[0].embedding, vec![0.25]);
        assert_eq!(rows[1].embedding, vec![0.5]);
    }
}
