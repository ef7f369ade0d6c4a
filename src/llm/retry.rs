//! Exponential-backoff wrapper for any [`LlmClient`].
//!
//! The wrapper also fills in the configured sampling temperature for
//! requests that don't set their own.

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
    temperature: Option<f32>,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            temperature: None,
        }
    }

    /// Temperature used when a request leaves it unset.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((base as u64).min(self.config.max_delay_ms))
    }

    async fn with_retries<R, F, Fut>(&self, what: &str, mut call: F) -> Result<R, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R, LlmError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_retries && e.is_retryable() => {
                    let delay = self.compute_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying {}",
                        what
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, mut request: LlmRequest) -> Result<LlmResponse, LlmError> {
        request.temperature = request.temperature.or(self.temperature);
        self.with_retries("LLM request", || self.inner.complete(request.clone()))
            .await
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.with_retries("embedding request", || self.inner.embed(texts))
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_compute_delay_respects_max() {
        let client = RetryingClient::new(
            MockLlm::new(Vec::<&str>::new()),
            RetryConfig {
                max_retries: 5,
                initial_delay_ms: 500,
                max_delay_ms: 2000,
                backoff_multiplier: 10.0,
            },
        );
        assert_eq!(client.compute_delay(0), Duration::from_millis(500));
        assert_eq!(client.compute_delay(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let mock = MockLlm::new(["ok"]).fail_first(
            2,
            LlmError::Api {
                status: 429,
                body: "rate limit".to_string(),
            },
        );
        let client = RetryingClient::new(mock, fast_config(3));
        let response = client.complete(LlmRequest::default()).await.unwrap();
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn test_default_temperature_fills_unset_requests() {
        let mock = Arc::new(MockLlm::new(["one", "two"]));
        let client = RetryingClient::new(mock.clone(), fast_config(0)).with_temperature(0.3);

        client.complete(LlmRequest::default()).await.unwrap();
        client
            .complete(LlmRequest {
                temperature: Some(0.0),
                ..LlmRequest::default()
            })
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[1].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_gives_up_on_non_retryable() {
        let mock = MockLlm::new(["never"]).fail_first(
            1,
            LlmError::Api {
                status: 401,
                body: "unauthorized".to_string(),
            },
        );
        let client = RetryingClient::new(mock, fast_config(3));
        let err = client.complete(LlmRequest::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
    }
}
