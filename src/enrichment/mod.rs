// src/enrichment/mod.rs
pub mod cache;
pub mod domain;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod store;

pub use cache::{CacheRequest, CacheStats, EnrichmentCache};
pub use domain::{extract_domain, fallback_company_name, normalize_domain};
pub use orchestrator::{EnrichmentOrchestrator, EnrichmentSpec, QueueOptions};
pub use providers::{build_provider, EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse};
pub use store::{CacheStore, InMemoryCacheStore, PgCacheStore};
