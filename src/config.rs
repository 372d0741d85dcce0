// src/config.rs

use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::enrichment::orchestrator::EnrichmentSpec;
use crate::error::{CleanerError, Result};
use crate::matching::MatchingConfig;
use crate::models::{EnrichmentField, EnrichmentMode, ProviderKind};

// Duplicate matching
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;
pub const MATCHED_FIELD_THRESHOLD: f64 = 0.8; // strictly greater than
pub const EXACT_MATCH_THRESHOLD: f64 = 0.95; // strictly greater than
pub const MATCHER_YIELD_EVERY_ROWS: usize = 50;

// AI review of accepted matches
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const AI_REVIEW_MAX_CHUNK: usize = 10;
pub const AI_CONFIDENCE_BOOST: f64 = 1.1;

// Enrichment queue
pub const ENRICHMENT_ROW_DELAY: Duration = Duration::from_millis(500);
pub const PROGRESS_EVERY_ROWS: usize = 5;

// Provider transport
pub const MAX_TRANSPORT_RETRIES: u32 = 2;
pub const BASE_RETRY_DELAY_MS: u64 = 500;
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// Local OpenAI-compatible endpoint (Ollama by default)
pub const DEFAULT_LOCAL_LLM_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_LOCAL_LLM_MODEL: &str = "llama3.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationMode {
    #[serde(rename = "enrich-only")]
    EnrichOnly,
    #[serde(rename = "duplicates-only")]
    DuplicatesOnly,
    #[default]
    #[serde(rename = "both")]
    Both,
}

impl OperationMode {
    pub fn runs_enrichment(&self) -> bool {
        matches!(self, OperationMode::EnrichOnly | OperationMode::Both)
    }

    pub fn runs_duplicates(&self) -> bool {
        matches!(self, OperationMode::DuplicatesOnly | OperationMode::Both)
    }
}

/// Options object passed in by the host UI.
///
/// Field names follow the host's camelCase JSON so the same payload can be
/// deserialized directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    pub selected_columns: Vec<String>,
    pub fuzzy_threshold: f64,
    /// Advisory batch size for the AI review pass
    pub chunk_size: usize,
    pub hierarchy_detection: bool,
    #[serde(alias = "useAI")]
    pub use_ai: bool,
    pub ai_provider: ProviderKind,
    pub unique_identifier_column: Option<String>,
    pub domain_column: Option<String>,
    pub enrichment_type: EnrichmentMode,
    pub enrichment_provider: ProviderKind,
    pub enrichment_fields: Vec<EnrichmentField>,
    /// Use the shared environment key instead of `enrichment_api_key`
    pub use_emergent_key: bool,
    pub enrichment_api_key: Option<String>,
    pub perplexica_url: Option<String>,
    pub local_llm_url: Option<String>,
    pub operation_mode: OperationMode,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            selected_columns: Vec::new(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            hierarchy_detection: true,
            use_ai: false,
            ai_provider: ProviderKind::LocalLlm,
            unique_identifier_column: None,
            domain_column: None,
            enrichment_type: EnrichmentMode::Domain,
            enrichment_provider: ProviderKind::Cloudflare,
            enrichment_fields: vec![
                EnrichmentField::Industry,
                EnrichmentField::Vertical,
                EnrichmentField::Employees,
                EnrichmentField::HqCountry,
                EnrichmentField::ShortDescription,
                EnrichmentField::Revenue,
                EnrichmentField::BusinessType,
                EnrichmentField::RevenueModel,
                EnrichmentField::CompanyStage,
            ],
            use_emergent_key: true,
            enrichment_api_key: None,
            perplexica_url: None,
            local_llm_url: None,
            operation_mode: OperationMode::Both,
        }
    }
}

impl ProcessingOptions {
    /// Rejects option sets that cannot run, before any row is touched.
    pub fn validate(&self) -> Result<()> {
        if self.operation_mode.runs_duplicates() {
            if self.selected_columns.iter().all(|c| c.trim().is_empty()) {
                return Err(CleanerError::Config(
                    "select at least one column for duplicate detection".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
                return Err(CleanerError::Config(format!(
                    "fuzzy threshold must be within [0, 1], got {}",
                    self.fuzzy_threshold
                )));
            }
            if self.use_ai && self.chunk_size == 0 {
                return Err(CleanerError::Config(
                    "chunk size must be at least 1".to_string(),
                ));
            }
        }
        if self.operation_mode.runs_enrichment()
            && self
                .domain_column
                .as_deref()
                .is_none_or(|c| c.trim().is_empty())
        {
            return Err(CleanerError::Config(
                "select a domain column for enrichment".to_string(),
            ));
        }
        debug!("Processing options validated: {:?}", self.operation_mode);
        Ok(())
    }

    pub fn matching_config(&self) -> MatchingConfig {
        MatchingConfig {
            selected_columns: self.selected_columns.clone(),
            fuzzy_threshold: self.fuzzy_threshold,
            hierarchy_detection: self.hierarchy_detection,
            unique_identifier_column: self
                .unique_identifier_column
                .clone()
                .filter(|c| !c.trim().is_empty()),
        }
    }

    /// `None` when no domain column is set.
    pub fn enrichment_spec(&self) -> Option<EnrichmentSpec> {
        let column = self.domain_column.as_deref()?.trim();
        if column.is_empty() {
            return None;
        }
        Some(EnrichmentSpec::new(
            column,
            self.enrichment_type,
            &self.enrichment_fields,
        ))
    }

    /// Credentials for this run: environment defaults, overridden by the
    /// options' custom key and URLs.
    pub fn credentials(&self, env: &ProviderCredentials) -> ProviderCredentials {
        let mut creds = env.clone();
        if !self.use_emergent_key {
            creds.custom_api_key = self
                .enrichment_api_key
                .clone()
                .filter(|k| !k.trim().is_empty());
            creds.use_custom_key = true;
        }
        if let Some(url) = self.perplexica_url.as_ref().filter(|u| !u.trim().is_empty()) {
            creds.perplexica_url = Some(url.trim().to_string());
        }
        if let Some(url) = self.local_llm_url.as_ref().filter(|u| !u.trim().is_empty()) {
            creds.local_llm_url = url.trim().to_string();
        }
        creds
    }
}

/// API keys and endpoints for enrichment providers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// `accountId:apiToken`
    pub cloudflare_ai_key: Option<String>,
    /// Shared fallback key for any LLM provider
    pub emergent_llm_key: Option<String>,
    pub custom_api_key: Option<String>,
    /// When set, only `custom_api_key` is consulted for keyed providers
    pub use_custom_key: bool,
    pub perplexica_url: Option<String>,
    pub local_llm_url: String,
    pub local_llm_model: String,
}

// Keys must never reach the logs.
impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "[hidden]" } else { "none" };
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("cloudflare_ai_key", &mask(&self.cloudflare_ai_key))
            .field("emergent_llm_key", &mask(&self.emergent_llm_key))
            .field("custom_api_key", &mask(&self.custom_api_key))
            .field("use_custom_key", &self.use_custom_key)
            .field("perplexica_url", &self.perplexica_url)
            .field("local_llm_url", &self.local_llm_url)
            .field("local_llm_model", &self.local_llm_model)
            .finish()
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProviderCredentials {
    /// Reads provider credentials from the process environment.
    pub fn from_env() -> Self {
        let creds = Self {
            openai_api_key: env_non_empty("OPENAI_API_KEY"),
            anthropic_api_key: env_non_empty("ANTHROPIC_API_KEY"),
            cloudflare_ai_key: env_non_empty("CLOUDFLARE_AI_KEY"),
            emergent_llm_key: env_non_empty("EMERGENT_LLM_KEY"),
            custom_api_key: None,
            use_custom_key: false,
            perplexica_url: env_non_empty("PERPLEXICA_URL"),
            local_llm_url: env_non_empty("LOCAL_LLM_URL")
                .unwrap_or_else(|| DEFAULT_LOCAL_LLM_URL.to_string()),
            local_llm_model: env_non_empty("LOCAL_LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_LOCAL_LLM_MODEL.to_string()),
        };
        info!("Provider credentials loaded from environment: {:?}", creds);
        creds
    }

    /// The key a provider should authenticate with, if any.
    pub fn api_key_for(&self, provider: ProviderKind) -> Option<String> {
        if self.use_custom_key {
            return match provider {
                ProviderKind::Clearbit | ProviderKind::Perplexica | ProviderKind::LocalLlm => None,
                _ => self.custom_api_key.clone(),
            };
        }
        let specific = match provider {
            ProviderKind::OpenAi => self.openai_api_key.clone(),
            ProviderKind::Claude => self.anthropic_api_key.clone(),
            ProviderKind::Cloudflare => self.cloudflare_ai_key.clone(),
            ProviderKind::Clearbit | ProviderKind::Perplexica | ProviderKind::LocalLlm => {
                return None;
            }
        };
        specific.or_else(|| self.emergent_llm_key.clone())
    }

    /// Fails with a configuration error when `provider` cannot be called.
    pub fn check(&self, provider: ProviderKind) -> Result<()> {
        match provider {
            ProviderKind::Clearbit | ProviderKind::LocalLlm => Ok(()),
            ProviderKind::Perplexica => {
                if self.perplexica_url.is_some() {
                    Ok(())
                } else {
                    Err(CleanerError::Config(
                        "Perplexica requires a server URL".to_string(),
                    ))
                }
            }
            ProviderKind::Cloudflare => match self.api_key_for(provider) {
                Some(key) if key.split_once(':').is_some_and(|(a, t)| !a.is_empty() && !t.is_empty()) => Ok(()),
                Some(_) => Err(CleanerError::Config(
                    "Cloudflare key must be formatted as accountId:apiToken".to_string(),
                )),
                None => Err(CleanerError::Config(
                    "no API key available for cloudflare".to_string(),
                )),
            },
            ProviderKind::OpenAi | ProviderKind::Claude => {
                if self.api_key_for(provider).is_some() {
                    Ok(())
                } else {
                    Err(CleanerError::Config(format!(
                        "no API key available for {}",
                        provider
                    )))
                }
            }
        }
    }
}
