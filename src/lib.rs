// src/lib.rs
pub mod config;
pub mod csv_parser;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod results;

// Re-export common types for easier access
pub use config::{OperationMode, ProcessingOptions, ProviderCredentials};
pub use error::{CleanerError, Result};
pub use models::{
    CsvTable, EnrichmentField, EnrichmentMode, EnrichmentResult, HierarchyType, MatchAction,
    MatchResult, MatchType, ProviderKind, Row,
};

// Re-export important functionality
pub use db::PgPool;
pub use enrichment::{EnrichmentCache, EnrichmentOrchestrator};
pub use matching::DuplicateMatcher;
pub use pipeline::CleaningPipeline;
