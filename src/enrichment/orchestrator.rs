// src/enrichment/orchestrator.rs

use log::{debug, info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::cache::EnrichmentCache;
use super::domain::{extract_domain, fallback_company_name, normalize_domain};
use super::prompt::canonical_fields;
use super::providers::{EnrichmentProvider, EnrichmentRequest};
use crate::config::{ENRICHMENT_ROW_DELAY, PROGRESS_EVERY_ROWS};
use crate::error::{CleanerError, Result};
use crate::models::{CachedEnrichment, EnrichmentField, EnrichmentMode, EnrichmentResult, Row};

pub const NO_DOMAIN_VALUE: &str = "No domain value";
pub const DOMAIN_NOT_EXTRACTED: &str = "Could not extract domain";

/// What to enrich: which column, how to read it, which fields to ask for.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentSpec {
    pub domain_column: String,
    pub mode: EnrichmentMode,
    pub fields: Vec<EnrichmentField>,
}

impl EnrichmentSpec {
    pub fn new(domain_column: impl Into<String>, mode: EnrichmentMode, fields: &[EnrichmentField]) -> Self {
        Self {
            domain_column: domain_column.into(),
            mode,
            fields: canonical_fields(fields),
        }
    }

    /// Type segment of the cache key: mode plus the canonical field list.
    pub fn enrichment_type(&self) -> String {
        let fields: Vec<&str> = canonical_fields(&self.fields)
            .iter()
            .map(EnrichmentField::key)
            .collect();
        format!("{}:{}", self.mode.as_str(), fields.join(","))
    }
}

/// Parameters of the single-worker queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Minimum spacing between provider dispatches
    pub row_delay: Duration,
    /// Progress is reported every this many rows, and on the last row
    pub progress_every: usize,
    pub cancel: CancellationToken,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            row_delay: ENRICHMENT_ROW_DELAY,
            progress_every: PROGRESS_EVERY_ROWS,
            cancel: CancellationToken::new(),
        }
    }
}

/// Terminal state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Skipped,
    CacheHit,
    FreshSuccess,
    FreshFailure,
}

/// Spaces out provider dispatches. Cache hits never pass through it.
struct DispatchLimiter {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl DispatchLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    async fn acquire(&mut self, cancel: &CancellationToken) -> Result<()> {
        if let Some(last) = self.last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!("Rate limiting: waiting {}ms before next dispatch", wait.as_millis());
                tokio::select! {
                    _ = cancel.cancelled() => return Err(CleanerError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
        self.last_dispatch = Some(Instant::now());
        Ok(())
    }
}

/// Enriches rows one at a time through the cache and a single provider.
///
/// Rows are drained from a queue by one worker, so the provider never sees
/// concurrent calls and dispatches are spaced by `row_delay`. A failing row
/// is recorded and the queue moves on.
pub struct EnrichmentOrchestrator {
    cache: Arc<EnrichmentCache>,
    provider: Arc<dyn EnrichmentProvider>,
    queue: QueueOptions,
}

impl EnrichmentOrchestrator {
    pub fn new(
        cache: Arc<EnrichmentCache>,
        provider: Arc<dyn EnrichmentProvider>,
        queue: QueueOptions,
    ) -> Self {
        Self {
            cache,
            provider,
            queue,
        }
    }

    pub fn cache(&self) -> &Arc<EnrichmentCache> {
        &self.cache
    }

    /// Enriches every row, returning one result per row index.
    ///
    /// `on_progress(fraction_complete, enriched_so_far)` fires every
    /// `progress_every` rows and after the last one. Only cancellation
    /// aborts the run.
    pub async fn enrich_rows<F>(
        &self,
        rows: &[Row],
        spec: &EnrichmentSpec,
        mut on_progress: F,
    ) -> Result<BTreeMap<usize, EnrichmentResult>>
    where
        F: FnMut(f64, usize),
    {
        let total = rows.len();
        let enrichment_type = spec.enrichment_type();
        let progress_every = self.queue.progress_every.max(1);
        info!(
            "Enriching {} rows from column '{}' with {} ({})",
            total,
            spec.domain_column,
            self.provider.kind(),
            enrichment_type
        );

        let started = Instant::now();
        let mut pending: VecDeque<usize> = (0..total).collect();
        let mut limiter = DispatchLimiter::new(self.queue.row_delay);
        let mut results = BTreeMap::new();
        let mut enriched = 0usize;
        let mut tally: BTreeMap<&'static str, usize> = BTreeMap::new();

        while let Some(index) = pending.pop_front() {
            if self.queue.cancel.is_cancelled() {
                info!("Enrichment cancelled after {} of {} rows", index, total);
                return Err(CleanerError::Cancelled);
            }

            let (result, outcome) = self
                .enrich_row(&rows[index], spec, &enrichment_type, &mut limiter)
                .await?;
            if result.success {
                enriched += 1;
            }
            *tally
                .entry(match outcome {
                    RowOutcome::Skipped => "skipped",
                    RowOutcome::CacheHit => "cached",
                    RowOutcome::FreshSuccess => "fresh",
                    RowOutcome::FreshFailure => "failed",
                })
                .or_default() += 1;
            results.insert(index, result);

            let done = index + 1;
            if done % progress_every == 0 || done == total {
                on_progress(done as f64 / total as f64, enriched);
            }
        }

        info!(
            "Enrichment finished in {:.2?}: {} of {} rows enriched ({:?})",
            started.elapsed(),
            enriched,
            total,
            tally
        );
        Ok(results)
    }

    async fn enrich_row(
        &self,
        row: &Row,
        spec: &EnrichmentSpec,
        enrichment_type: &str,
        limiter: &mut DispatchLimiter,
    ) -> Result<(EnrichmentResult, RowOutcome)> {
        let provider_kind = self.provider.kind();
        let raw = row.get(&spec.domain_column).trim();
        if raw.is_empty() {
            return Ok((
                EnrichmentResult::failure("", "", provider_kind, NO_DOMAIN_VALUE),
                RowOutcome::Skipped,
            ));
        }

        let (subject, fallback_name) = match spec.mode {
            EnrichmentMode::Domain => match extract_domain(raw) {
                Some(domain) => {
                    let normalized = normalize_domain(&domain);
                    let fallback = fallback_company_name(&normalized);
                    (normalized, fallback)
                }
                None => {
                    debug!("No domain found in '{}'", raw);
                    return Ok((
                        EnrichmentResult::failure(raw, "", provider_kind, DOMAIN_NOT_EXTRACTED),
                        RowOutcome::Skipped,
                    ));
                }
            },
            EnrichmentMode::Company => (raw.to_lowercase(), raw.to_string()),
        };

        if let Some(cached) = self.cache.get(&subject, provider_kind, enrichment_type).await {
            debug!("Using cached enrichment for {}", subject);
            return Ok((cached.to_result(raw), RowOutcome::CacheHit));
        }

        limiter.acquire(&self.queue.cancel).await?;
        let request = EnrichmentRequest {
            subject: subject.clone(),
            mode: spec.mode,
            fields: spec.fields.clone(),
        };
        match self.provider.enrich(&request).await {
            Ok(response) => {
                let result = EnrichmentResult {
                    domain: raw.to_string(),
                    normalized_domain: subject.clone(),
                    company_name: response.company_name.or(Some(fallback_name)),
                    profile: response.profile,
                    success: true,
                    error: None,
                    provider: provider_kind,
                    from_cache: Some(false),
                };
                let key = EnrichmentCache::generate_cache_key(&subject, provider_kind, enrichment_type);
                self.cache
                    .set(CachedEnrichment::from_result(key, enrichment_type, &result))
                    .await;
                debug!("Enriched {} via {}", subject, provider_kind);
                Ok((result, RowOutcome::FreshSuccess))
            }
            Err(e) => {
                warn!("Enrichment failed for {} via {}: {}", subject, provider_kind, e);
                let mut result = EnrichmentResult::failure(raw, subject, provider_kind, e.to_string());
                result.company_name = Some(fallback_name);
                result.from_cache = Some(false);
                Ok((result, RowOutcome::FreshFailure))
            }
        }
    }
}
