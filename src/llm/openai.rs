//! OpenAI-compatible chat completions client (used for Groq).

use super::{http_client, LlmClient, LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

pub struct OpenAiCompatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    key_var: &'static str,
    timeout_secs: u64,
    http_client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        key_var: &'static str,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            key_var,
            timeout_secs,
            http_client: http_client(timeout_secs),
        }
    }

    fn build_messages(request: &LlmRequest) -> Vec<WireMessage> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        for msg in &request.messages {
            messages.push(WireMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            });
        }
        messages
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingKey(self.key_var))?;

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: Self::build_messages(&request),
            temperature: request.temperature,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::Empty)?;

        Ok(LlmResponse {
            content,
            model: if parsed.model.is_empty() {
                self.model.clone()
            } else {
                parsed.model
            },
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[test]
    fn test_build_messages_prepends_system() {
        let request = LlmRequest {
            system_prompt: Some("sys".to_string()),
            messages: vec![ChatMessage::user("question")],
            ..LlmRequest::default()
        };
        let messages = OpenAiCompatClient::build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content.as_deref(), Some("question"));
    }

    #[tokio::test]
    async fn test_missing_key_names_variable() {
        let client = OpenAiCompatClient::new(
            "http://127.0.0.1:9".to_string(),
            "llama".to_string(),
            None,
            "GROQ_API_KEY",
            1,
        );
        let err = client.complete(LlmRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "missing API key: set GROQ_API_KEY");
    }
}
