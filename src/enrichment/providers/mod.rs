// src/enrichment/providers/mod.rs

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::config::ProviderCredentials;
use crate::enrichment::prompt::{
    build_enrichment_prompt, extract_json_object, parse_profile, ENRICHMENT_SYSTEM_PROMPT,
};
use crate::models::{CompanyProfile, EnrichmentField, EnrichmentMode, ProviderKind};

pub mod claude;
pub mod clearbit;
pub mod cloudflare;
pub mod http;
pub mod openai;
pub mod perplexica;

pub use claude::ClaudeProvider;
pub use clearbit::ClearbitProvider;
pub use cloudflare::CloudflareProvider;
pub use http::HttpClient;
pub use openai::OpenAiProvider;
pub use perplexica::PerplexicaProvider;

/// Failures of a single provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not parse provider response: {0}")]
    Parse(String),

    #[error("Provider returned no data: {0}")]
    NoData(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("{0} does not support this operation")]
    Unsupported(ProviderKind),
}

impl ProviderError {
    /// Transient failures worth another attempt: network errors, throttling
    /// and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One enrichment lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRequest {
    /// Normalized domain, or lowercased company name
    pub subject: String,
    pub mode: EnrichmentMode,
    pub fields: Vec<EnrichmentField>,
}

/// Structured answer from a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub company_name: Option<String>,
    pub profile: CompanyProfile,
}

/// Strategy interface shared by every enrichment backend.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError>;

    /// Raw text completion, used for match review. Lookup-only providers
    /// leave the default.
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported(self.kind()))
    }
}

/// Enrichment for LLM-backed providers: prompt, complete, pull out the JSON.
pub(crate) async fn enrich_with_completion<P>(
    provider: &P,
    request: &EnrichmentRequest,
) -> Result<ProviderResponse, ProviderError>
where
    P: EnrichmentProvider + ?Sized,
{
    let prompt = build_enrichment_prompt(&request.subject, request.mode, &request.fields);
    let text = provider.complete(ENRICHMENT_SYSTEM_PROMPT, &prompt).await?;
    let object = extract_json_object(&text).ok_or_else(|| {
        ProviderError::Parse(format!("no JSON object in {} response", provider.kind()))
    })?;
    let (company_name, profile) = parse_profile(&object, &request.fields);
    debug!(
        "{} answered for {}: name={:?}, {} fields",
        provider.kind(),
        request.subject,
        company_name,
        profile.populated().count()
    );
    Ok(ProviderResponse {
        company_name,
        profile,
    })
}

/// Builds the provider selected by `kind` with the credentials it needs.
pub fn build_provider(
    kind: ProviderKind,
    credentials: &ProviderCredentials,
    http: HttpClient,
) -> Result<Arc<dyn EnrichmentProvider>, ProviderError> {
    let missing = || ProviderError::MissingCredential(format!("no API key for {}", kind));
    let provider: Arc<dyn EnrichmentProvider> = match kind {
        ProviderKind::Clearbit => Arc::new(ClearbitProvider::new(http)),
        ProviderKind::OpenAi => {
            let key = credentials.api_key_for(kind).ok_or_else(missing)?;
            Arc::new(OpenAiProvider::openai(http, key))
        }
        ProviderKind::LocalLlm => Arc::new(OpenAiProvider::local(
            http,
            &credentials.local_llm_url,
            &credentials.local_llm_model,
        )),
        ProviderKind::Claude => {
            let key = credentials.api_key_for(kind).ok_or_else(missing)?;
            Arc::new(ClaudeProvider::new(http, key))
        }
        ProviderKind::Cloudflare => {
            let key = credentials.api_key_for(kind).ok_or_else(missing)?;
            Arc::new(CloudflareProvider::from_key(http, &key)?)
        }
        ProviderKind::Perplexica => {
            let url = credentials.perplexica_url.as_deref().ok_or_else(|| {
                ProviderError::MissingCredential("Perplexica server URL".to_string())
            })?;
            Arc::new(PerplexicaProvider::new(http, url))
        }
    };
    Ok(provider)
}
