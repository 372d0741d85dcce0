// src/enrichment/providers/cloudflare.rs

use async_trait::async_trait;
use serde_json::json;

use super::http::{endpoint, HttpClient};
use super::{enrich_with_completion, EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
use crate::models::ProviderKind;

pub const CLOUDFLARE_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
pub const CLOUDFLARE_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

/// Workers AI client. Credentials come as a single `accountId:apiToken` key.
pub struct CloudflareProvider {
    http: HttpClient,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl CloudflareProvider {
    pub fn from_key(http: HttpClient, key: &str) -> Result<Self, ProviderError> {
        match key.split_once(':') {
            Some((account_id, api_token)) if !account_id.is_empty() && !api_token.is_empty() => {
                Ok(Self {
                    http,
                    base_url: CLOUDFLARE_BASE_URL.to_string(),
                    account_id: account_id.trim().to_string(),
                    api_token: api_token.trim().to_string(),
                })
            }
            _ => Err(ProviderError::MissingCredential(
                "Cloudflare key must be formatted as accountId:apiToken".to_string(),
            )),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EnrichmentProvider for CloudflareProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloudflare
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        enrich_with_completion(self, request).await
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let path = format!("accounts/{}/ai/run/{}", self.account_id, CLOUDFLARE_MODEL);
        let url = endpoint(&self.base_url, &path)?;
        let body = json!({
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "stream": false,
        });

        let response = self
            .http
            .send_json("cloudflare", |client| {
                client
                    .post(url.clone())
                    .bearer_auth(&self.api_token)
                    .json(&body)
            })
            .await?;

        response["result"]["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Parse("missing result.response".to_string()))
    }
}
