//! Local Ollama chat client.

use super::{http_client, LlmClient, LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

pub struct OllamaClient {
    ollama_url: String,
    model: String,
    timeout_secs: u64,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(ollama_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
            model,
            timeout_secs,
            http_client: http_client(timeout_secs),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/api/chat", self.ollama_url);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_prompt {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
        }));

        let body = OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            format: request.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        debug!("Sending chat request with {} messages", body.messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, &self.ollama_url, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        if chat_response.message.content.trim().is_empty() {
            return Err(LlmError::Empty);
        }

        Ok(LlmResponse {
            content: chat_response.message.content,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let body = OllamaChatRequest {
            model: "llama3.2:latest".to_string(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            format: Some("json"),
            options: OllamaOptions {
                temperature: Some(0.1),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connect_error() {
        let client = OllamaClient::new("http://127.0.0.1:9".to_string(), "m".to_string(), 2);
        let err = client.complete(LlmRequest::default()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
