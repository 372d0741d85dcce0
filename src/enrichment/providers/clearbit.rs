// src/enrichment/providers/clearbit.rs

use async_trait::async_trait;

use super::http::{endpoint, HttpClient};
use super::{EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
use crate::models::ProviderKind;

pub const CLEARBIT_BASE_URL: &str = "https://autocomplete.clearbit.com";

/// Clearbit autocomplete lookup. Keyless, and only knows company names.
pub struct ClearbitProvider {
    http: HttpClient,
    base_url: String,
}

impl ClearbitProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: CLEARBIT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EnrichmentProvider for ClearbitProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Clearbit
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        let url = endpoint(&self.base_url, "v1/companies/suggest")?;
        let response = self
            .http
            .send_json("clearbit", |client| {
                client
                    .get(url.clone())
                    .query(&[("query", request.subject.as_str())])
            })
            .await?;

        let name = response
            .as_array()
            .and_then(|suggestions| suggestions.first())
            .and_then(|first| first["name"].as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ProviderError::NoData(format!("no Clearbit suggestion for {}", request.subject))
            })?;

        Ok(ProviderResponse {
            company_name: Some(name.to_string()),
            profile: Default::default(),
        })
    }
}
