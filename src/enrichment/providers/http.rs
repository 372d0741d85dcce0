// src/enrichment/providers/http.rs

use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

use super::ProviderError;
use crate::config::{BASE_RETRY_DELAY_MS, HTTP_TIMEOUT, MAX_TRANSPORT_RETRIES};

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Shared HTTP client with the transport retry policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    base_retry_delay: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries: MAX_TRANSPORT_RETRIES,
            base_retry_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
        })
    }

    pub fn with_retry_policy(mut self, max_retries: u32, base_retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_retry_delay = base_retry_delay;
        self
    }

    /// Sends the request built by `build`, retrying transient failures with
    /// exponential backoff, and returns the JSON body.
    pub async fn send_json<F>(&self, label: &str, build: F) -> Result<Value, ProviderError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut last_error = None;

        for retry in 0..=self.max_retries {
            if retry > 0 {
                let delay = self.base_retry_delay * 2u32.pow(retry - 1);
                info!(
                    "Retry {}/{} for {} request, waiting {}ms",
                    retry,
                    self.max_retries,
                    label,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let start_time = Instant::now();
            match self.send_once(build(&self.client)).await {
                Ok(body) => {
                    debug!(
                        "{} request succeeded in {:.2?}",
                        label,
                        start_time.elapsed()
                    );
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    warn!("{} request failed (attempt {}): {}", label, retry + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::Transport(format!("{} request was never attempted", label))
        }))
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("invalid JSON body: {}", e)))
    }
}

/// Joins `path` onto `base`, keeping any path prefix `base` already has.
pub fn endpoint(base: &str, path: &str) -> Result<Url, ProviderError> {
    let base = format!("{}/", base.trim().trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|b| b.join(path.trim_start_matches('/')))
        .map_err(|e| ProviderError::Parse(format!("invalid endpoint URL '{}': {}", base, e)))
}
