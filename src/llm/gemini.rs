//! Google Gemini REST client (`generateContent` and `batchEmbedContents`).

use super::{http_client, LlmClient, LlmError, LlmRequest, LlmResponse, Role};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
struct EmbedBatchRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedBatchResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

pub struct GeminiClient {
    base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
    timeout_secs: u64,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        base_url: String,
        model: String,
        embedding_model: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            embedding_model,
            api_key,
            timeout_secs,
            http_client: http_client(timeout_secs),
        }
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .ok_or(LlmError::MissingKey("GOOGLE_API_KEY"))
    }

    fn build_body(request: &LlmRequest) -> GenerateRequest {
        let system_instruction = request.system_prompt.as_ref().map(|s| Content {
            role: None,
            parts: vec![Part { text: s.clone() }],
        });

        // Gemini only knows "user" and "model"; system turns are folded into the instruction.
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.json_mode.then_some("application/json"),
            },
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, LlmError> {
        let response = self
            .http_client
            .post(url)
            .query(&[("key", self.api_key()?)])
            .json(body)
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

        response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = Self::build_body(&request);
        debug!("Gemini request with {} contents", body.contents.len());

        let response: GenerateResponse = self.post(&url, &body).await?;

        let text = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::Empty);
        }

        Ok(LlmResponse {
            content: text,
            model: self.model.clone(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url, self.embedding_model
        );
        let body = EmbedBatchRequest {
            requests: texts
                .iter()
                .map(|t| EmbedRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: Content {
                        role: None,
                        parts: vec![Part { text: t.clone() }],
                    },
                })
                .collect(),
        };

        let response: EmbedBatchResponse = self.post(&url, &body).await?;
        if response.embeddings.len() != texts.len() {
            return Err(LlmError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
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
    fn test_build_body_maps_roles() {
        let request = LlmRequest {
            system_prompt: Some("be brief".to_string()),
            messages: vec![
                ChatMessage::user("hi"),
                ChatMessage {
                    role: Role::Assistant,
                    content: "hello".to_string(),
                },
            ],
            temperature: Some(0.0),
            json_mode: true,
        };

        let body = serde_json::to_value(GeminiClient::build_body(&request)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let client = GeminiClient::new(
            "http://127.0.0.1:9".to_string(),
            "gemini-test".to_string(),
            "embed-test".to_string(),
            None,
            1,
        );
        let err = client
            .complete(LlmRequest {
                messages: vec![ChatMessage::user("hi")],
                ..LlmRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingKey(_)));
    }
}
