use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{ChatRequest, ChatResponse, Provider};
use crate::errors::ProviderError;

/// OpenAI-compatible client for the `/chat/completions` endpoint
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. `https://api.openai.com/v1`
    endpoint: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl OpenAI {
    /// Create a new client with retry and timeout configuration
    pub fn new_with_config(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        max_retries: u32,
        backoff_base_ms: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            max_retries,
            backoff_base_ms,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Send one request without retrying
    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::AuthenticationError(message)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
                _ => ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message,
                },
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

/// Whether an error is worth another attempt
fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::ConnectionError(_)
        | ProviderError::RequestFailed(_)
        | ProviderError::RateLimitExceeded(_) => true,
        ProviderError::ApiError { status_code, .. } => *status_code >= 500,
        ProviderError::ParseError(_) | ProviderError::AuthenticationError(_) => false,
    }
}

#[async_trait]
impl Provider for OpenAI {
    /// Complete a chat request with retry logic
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    error!(
                        "Chat completion error: {} - attempt {}/{}",
                        e,
                        attempt,
                        self.max_retries + 1
                    );
                    let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                    debug!("Retrying chat completion in {}ms", backoff_ms);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    error!("Chat completion failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
