// src/pipeline.rs

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ProcessingOptions, ProviderCredentials};
use crate::csv_parser::parse_csv;
use crate::enrichment::cache::{CacheStats, EnrichmentCache};
use crate::enrichment::orchestrator::{EnrichmentOrchestrator, QueueOptions};
use crate::enrichment::providers::{build_provider, EnrichmentProvider, HttpClient};
use crate::error::{CleanerError, Result};
use crate::matching::{enhance_matches, DuplicateMatcher, LlmMatchReviewer, MatchReviewer};
use crate::models::{CsvTable, EnrichmentResult, MatchResult, ProviderKind, Row};
use crate::results::{augment_rows, build_export, export_csv, ProcessingStats};

// Share of the progress bar given to each phase when several run.
const ENRICHMENT_SHARE_WITH_MATCHING: f64 = 0.2;
const MATCHING_SHARE_WITH_REVIEW: f64 = 0.5;
const MATCHING_SHARE_WITHOUT_REVIEW: f64 = 0.8;
const REVIEW_SHARE: f64 = 0.3;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    /// Headers of the input file, in file order
    pub headers: Vec<String>,
    /// Input rows, augmented with `Enriched_*` columns when enrichment ran
    pub rows: Vec<Row>,
    pub matches: Vec<MatchResult>,
    /// Per-row enrichment results; `None` when enrichment was not requested
    pub enrichments: Option<BTreeMap<usize, EnrichmentResult>>,
    pub stats: ProcessingStats,
    pub cache_stats: CacheStats,
}

impl PipelineOutcome {
    pub fn export_table(&self) -> CsvTable {
        build_export(
            &self.headers,
            &self.rows,
            &self.matches,
            self.enrichments.as_ref(),
        )
    }

    pub fn export_csv(&self) -> Result<String> {
        export_csv(
            &self.headers,
            &self.rows,
            &self.matches,
            self.enrichments.as_ref(),
        )
    }
}

/// Drives one cleaning run: enrichment, then duplicate detection on the
/// augmented rows, then the optional AI review.
///
/// Providers are built from the run's options and credentials unless one was
/// injected up front.
pub struct CleaningPipeline {
    cache: Arc<EnrichmentCache>,
    credentials: ProviderCredentials,
    enrichment_provider: Option<Arc<dyn EnrichmentProvider>>,
    reviewer: Option<Arc<dyn MatchReviewer>>,
    queue: QueueOptions,
}

impl CleaningPipeline {
    pub fn new(cache: Arc<EnrichmentCache>, credentials: ProviderCredentials) -> Self {
        Self {
            cache,
            credentials,
            enrichment_provider: None,
            reviewer: None,
            queue: QueueOptions::default(),
        }
    }

    pub fn with_enrichment_provider(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichment_provider = Some(provider);
        self
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn MatchReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_queue_options(mut self, queue: QueueOptions) -> Self {
        self.queue = queue;
        self
    }

    pub fn cache(&self) -> &Arc<EnrichmentCache> {
        &self.cache
    }

    /// Token that aborts the current and any later run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.queue.cancel.clone()
    }

    /// Parses `content` and runs the pipeline on it.
    pub async fn process_csv<F>(
        &self,
        content: &str,
        options: &ProcessingOptions,
        on_progress: F,
    ) -> Result<PipelineOutcome>
    where
        F: FnMut(f64),
    {
        let table = parse_csv(content)?;
        self.run(&table, options, on_progress).await
    }

    /// Runs the phases `options.operation_mode` asks for.
    ///
    /// Options and credentials are checked before any row is processed.
    /// `on_progress` receives a monotonically increasing overall fraction and
    /// ends at 1.0.
    pub async fn run<F>(
        &self,
        table: &CsvTable,
        options: &ProcessingOptions,
        mut on_progress: F,
    ) -> Result<PipelineOutcome>
    where
        F: FnMut(f64),
    {
        options.validate()?;
        let credentials = options.credentials(&self.credentials);
        let mode = options.operation_mode;
        let should_enrich = mode.runs_enrichment();
        let should_match = mode.runs_duplicates();
        let review = should_match && options.use_ai;

        let enrichment_provider = if should_enrich {
            Some(self.resolve_enrichment_provider(options.enrichment_provider, &credentials)?)
        } else {
            None
        };
        let reviewer = if review {
            Some(self.resolve_reviewer(options.ai_provider, &credentials)?)
        } else {
            None
        };
        self.warn_on_unknown_columns(table, options);

        let run_id = Uuid::new_v4().to_string()[..8].to_string();
        let start_time = Instant::now();
        info!(
            "[{}] Processing {} rows ({:?}, AI review: {})",
            run_id,
            table.rows.len(),
            mode,
            review
        );
        on_progress(0.0);

        // Phase 1: enrichment
        let mut rows = table.rows.clone();
        let mut enrichments = None;
        if let (Some(provider), Some(spec)) = (enrichment_provider, options.enrichment_spec()) {
            info!("[{}] Phase 1: Enrichment", run_id);
            let phase_start = Instant::now();
            let share = if should_match {
                ENRICHMENT_SHARE_WITH_MATCHING
            } else {
                1.0
            };
            let orchestrator =
                EnrichmentOrchestrator::new(self.cache.clone(), provider, self.queue.clone());
            let results = orchestrator
                .enrich_rows(&table.rows, &spec, |p, _| on_progress(p * share))
                .await?;
            rows = augment_rows(&table.rows, &results);
            info!(
                "[{}] Phase 1 complete in {:.2?}",
                run_id,
                phase_start.elapsed()
            );
            enrichments = Some(results);
        }

        // Phase 2: duplicate detection
        let mut matches = Vec::new();
        if should_match {
            info!("[{}] Phase 2: Duplicate detection", run_id);
            let phase_start = Instant::now();
            let base = if should_enrich {
                ENRICHMENT_SHARE_WITH_MATCHING
            } else {
                0.0
            };
            let range = if review {
                MATCHING_SHARE_WITH_REVIEW
            } else {
                MATCHING_SHARE_WITHOUT_REVIEW
            };
            let matcher = DuplicateMatcher::new(options.matching_config());
            matches = matcher
                .find_duplicates_async(&rows, &self.queue.cancel, |p| {
                    on_progress(base + p * range)
                })
                .await?;
            info!(
                "[{}] Phase 2 complete in {:.2?}: {} candidates",
                run_id,
                phase_start.elapsed(),
                matches.len()
            );

            // Phase 3: AI review
            if let Some(reviewer) = reviewer.as_deref() {
                if !matches.is_empty() {
                    info!("[{}] Phase 3: AI review", run_id);
                    let phase_start = Instant::now();
                    let base = base + range;
                    matches = enhance_matches(
                        reviewer,
                        matches,
                        &options.selected_columns,
                        options.chunk_size,
                        &self.queue.cancel,
                        |p| on_progress(base + p * REVIEW_SHARE),
                    )
                    .await?;
                    info!(
                        "[{}] Phase 3 complete in {:.2?}",
                        run_id,
                        phase_start.elapsed()
                    );
                }
            }
        }

        let stats = ProcessingStats::from_run(
            table.rows.len(),
            &matches,
            enrichments.as_ref(),
            start_time.elapsed(),
        );
        let cache_stats = self.cache.stats();
        on_progress(1.0);
        info!(
            "[{}] Processing complete in {:.2?}: {} duplicates, {} hierarchies, {} rows enriched (cache hit rate {:.2}%)",
            run_id,
            stats.processing_time,
            stats.duplicates_found,
            stats.hierarchies_identified,
            stats.enriched_rows,
            cache_stats.hit_rate
        );

        Ok(PipelineOutcome {
            run_id,
            headers: table.headers.clone(),
            rows,
            matches,
            enrichments,
            stats,
            cache_stats,
        })
    }

    fn resolve_enrichment_provider(
        &self,
        kind: ProviderKind,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn EnrichmentProvider>> {
        if let Some(provider) = &self.enrichment_provider {
            debug!("Using injected enrichment provider {}", provider.kind());
            return Ok(provider.clone());
        }
        credentials.check(kind)?;
        Ok(build_provider(kind, credentials, HttpClient::new()?)?)
    }

    fn resolve_reviewer(
        &self,
        kind: ProviderKind,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn MatchReviewer>> {
        if let Some(reviewer) = &self.reviewer {
            return Ok(reviewer.clone());
        }
        if !kind.is_llm() {
            return Err(CleanerError::Config(format!(
                "{} cannot review matches; choose an LLM provider",
                kind
            )));
        }
        credentials.check(kind)?;
        let provider = build_provider(kind, credentials, HttpClient::new()?)?;
        Ok(Arc::new(LlmMatchReviewer::new(provider)))
    }

    fn warn_on_unknown_columns(&self, table: &CsvTable, options: &ProcessingOptions) {
        let known = |c: &str| table.headers.iter().any(|h| h == c);
        if options.operation_mode.runs_duplicates() {
            for column in options.selected_columns.iter().filter(|c| !known(c)) {
                // Enriched_* columns only exist after phase 1.
                if !column.starts_with("Enriched_") {
                    warn!("Selected column '{}' is not in the file; it will compare as empty", column);
                }
            }
        }
        if options.operation_mode.runs_enrichment() {
            if let Some(column) = options.domain_column.as_deref().filter(|c| !known(c.trim())) {
                warn!("Domain column '{}' is not in the file; every row will be skipped", column);
            }
        }
    }
}
