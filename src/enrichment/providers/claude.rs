// src/enrichment/providers/claude.rs

use async_trait::async_trait;
use serde_json::json;

use super::http::{endpoint, HttpClient};
use super::{enrich_with_completion, EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
use crate::models::ProviderKind;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API client.
pub struct ClaudeProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(http: HttpClient, api_key: String) -> Self {
        Self {
            http,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key,
            model: CLAUDE_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EnrichmentProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        enrich_with_completion(self, request).await
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = endpoint(&self.base_url, "v1/messages")?;
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .send_json("claude", |client| {
                client
                    .post(url.clone())
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            })
            .await?;

        response["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Parse("missing content[0].text".to_string()))
    }
}
