//! Scripted client for tests.

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every request.
///
/// Once the script runs out, the last response is repeated; an empty
/// script answers with [`LlmError::Empty`].
pub struct MockLlm {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    failures: Mutex<VecDeque<LlmError>>,
    requests: Mutex<Vec<LlmRequest>>,
    embedding_dim: usize,
}

impl MockLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            embedding_dim: 4,
        }
    }

    /// Fail the first `n` calls with `error` before replaying the script.
    pub fn fail_first(self, n: usize, error: LlmError) -> Self {
        {
            let mut failures = self.failures.lock().unwrap();
            for _ in 0..n {
                failures.push_back(error.clone());
            }
        }
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The user message of every request, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| {
                r.messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request);

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let next = self.responses.lock().unwrap().pop_front();
        let content = match next {
            Some(content) => {
                *self.last.lock().unwrap() = Some(content.clone());
                content
            }
            None => self.last.lock().unwrap().clone().ok_or(LlmError::Empty)?,
        };

        Ok(LlmResponse {
            content,
            model: "mock".to_string(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.embedding_dim];
                v[0] = t.len() as f32;
                v
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
