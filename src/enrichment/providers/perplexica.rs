// src/enrichment/providers/perplexica.rs

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use super::http::{endpoint, HttpClient};
use super::{EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
use crate::enrichment::prompt::{
    build_enrichment_prompt, extract_company_name_from_text, extract_json_object, parse_profile,
};
use crate::models::{CompanyProfile, EnrichmentField, ProviderKind};

const FREE_TEXT_DESCRIPTION_CHARS: usize = 200;

/// Self-hosted Perplexica web-search client.
///
/// Answers are usually JSON; when they are not, the company name is scraped
/// from the prose and the start of the answer kept as a description.
pub struct PerplexicaProvider {
    http: HttpClient,
    base_url: String,
}

impl PerplexicaProvider {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    async fn search(&self, query: &str) -> Result<String, ProviderError> {
        let url = endpoint(&self.base_url, "api/search")?;
        let body = json!({
            "focusMode": "webSearch",
            "query": query,
            "stream": false,
        });
        let response = self
            .http
            .send_json("perplexica", |client| client.post(url.clone()).json(&body))
            .await?;
        response["message"]
            .as_str()
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::NoData("empty Perplexica message".to_string()))
    }
}

#[async_trait]
impl EnrichmentProvider for PerplexicaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexica
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        let query = build_enrichment_prompt(&request.subject, request.mode, &request.fields);
        let answer = self.search(&query).await?;

        if let Some(object) = extract_json_object(&answer) {
            let (company_name, profile) = parse_profile(&object, &request.fields);
            return Ok(ProviderResponse {
                company_name,
                profile,
            });
        }

        debug!("Perplexica answer for {} is free text", request.subject);
        let company_name = extract_company_name_from_text(&answer).ok_or_else(|| {
            ProviderError::NoData(format!("no company name in answer for {}", request.subject))
        })?;
        let mut profile = CompanyProfile::default();
        let snippet: String = answer.chars().take(FREE_TEXT_DESCRIPTION_CHARS).collect();
        profile.set(EnrichmentField::Description, snippet);
        Ok(ProviderResponse {
            company_name: Some(company_name),
            profile,
        })
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        self.search(&format!("{}\n\n{}", system, prompt)).await
    }
}
