//! LLM provider clients.
//!
//! Every worker talks to a model through the [`LlmClient`] trait so the
//! provider (Gemini, Groq, or a local Ollama) can be swapped from
//! `.tsw.toml` and replaced by a scripted client in tests.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod retry;

#[cfg(test)]
pub mod mock;

use crate::config::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;
pub use retry::{RetryConfig, RetryingClient};

/// Errors raised at the provider boundary.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("model returned an empty response")]
    Empty,

    #[error("missing API key: set {0}")]
    MissingKey(&'static str),

    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    #[error("request failed: {0}")]
    Transport(String),
}

impl LlmError {
    /// Rate limits and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Timeout(_) | LlmError::Connect(_) => true,
            _ => false,
        }
    }

    /// Map a reqwest failure the same way for every provider.
    pub(crate) fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout_secs)
        } else if err.is_connect() {
            LlmError::Connect(endpoint.to_string())
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON body when it supports a JSON mode.
    pub json_mode: bool,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Embed a batch of texts. Providers without an embedding endpoint refuse.
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::Unsupported("embedding"))
    }

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        (**self).embed(texts).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Hosted or local model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Groq,
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Groq => write!(f, "groq"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Build a retrying client for `provider` from the global settings.
///
/// API keys are read from the environment; a missing key surfaces on the
/// first request rather than here, so commands that never touch a provider
/// still run.
pub fn build_client(provider: Provider, settings: &Settings) -> Arc<dyn LlmClient> {
    let models = &settings.models;
    let providers = &settings.providers;
    let retry = RetryConfig {
        max_retries: models.retries,
        ..RetryConfig::default()
    };

    match provider {
        Provider::Gemini => Arc::new(
            RetryingClient::new(
                GeminiClient::new(
                    providers.gemini_url.clone(),
                    models.gemini_model.clone(),
                    models.embedding_model.clone(),
                    gemini_api_key(),
                    models.timeout_seconds,
                ),
                retry,
            )
            .with_temperature(models.temperature),
        ),
        Provider::Groq => Arc::new(
            RetryingClient::new(
                OpenAiCompatClient::new(
                    providers.groq_url.clone(),
                    models.groq_model.clone(),
                    std::env::var("GROQ_API_KEY").ok(),
                    "GROQ_API_KEY",
                    models.timeout_seconds,
                ),
                retry,
            )
            .with_temperature(models.temperature),
        ),
        Provider::Ollama => Arc::new(
            RetryingClient::new(
                OllamaClient::new(
                    providers.ollama_url.clone(),
                    models.ollama_model.clone(),
                    models.timeout_seconds,
                ),
                retry,
            )
            .with_temperature(models.temperature),
        ),
    }
}

fn gemini_api_key() -> Option<String> {
    std::env::var("GOOGLE_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .ok()
}

/// Shared reqwest client with the configured timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
