// src/error.rs

use crate::enrichment::providers::ProviderError;

/// Errors surfaced to the caller of a cleaning operation.
///
/// Per-row enrichment failures are not represented here: they are recorded as
/// failed `EnrichmentResult`s and never abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum CleanerError {
    #[error("Malformed CSV input: {0}")]
    Parse(String),

    #[error("Invalid processing options: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Enrichment cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CleanerError>;
