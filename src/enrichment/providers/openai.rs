// src/enrichment/providers/openai.rs

use async_trait::async_trait;
use serde_json::json;

use super::http::{endpoint, HttpClient};
use super::{enrich_with_completion, EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
use crate::models::ProviderKind;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o";
const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 800;

/// Chat-completions client. Also drives local OpenAI-compatible servers
/// (Ollama, LM Studio) for the `local-llm` provider.
pub struct OpenAiProvider {
    http: HttpClient,
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiProvider {
    pub fn openai(http: HttpClient, api_key: String) -> Self {
        Self {
            http,
            kind: ProviderKind::OpenAi,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: Some(api_key),
            model: OPENAI_MODEL.to_string(),
        }
    }

    pub fn local(http: HttpClient, base_url: &str, model: &str) -> Self {
        Self {
            http,
            kind: ProviderKind::LocalLlm,
            base_url: base_url.to_string(),
            api_key: None,
            model: model.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EnrichmentProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        enrich_with_completion(self, request).await
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = endpoint(&self.base_url, "chat/completions")?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .http
            .send_json(self.kind.as_str(), |client| {
                let builder = client.post(url.clone()).json(&body);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Parse("missing choices[0].message.content".to_string()))
    }
}
