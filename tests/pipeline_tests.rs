// tests/pipeline_tests.rs

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{init_logger, FakeProvider};
use crm_cleaner_lib::csv_parser::parse_csv;
use crm_cleaner_lib::enrichment::providers::ProviderError;
use crm_cleaner_lib::enrichment::{EnrichmentCache, QueueOptions};
use crm_cleaner_lib::matching::MatchReviewer;
use crm_cleaner_lib::models::{EnrichmentField, MatchAction, MatchResult, MatchType, ProviderKind};
use crm_cleaner_lib::results::{set_action, DUPLICATE_STATUS_COLUMN, ENRICHED_STATUS_COLUMN};
use crm_cleaner_lib::{
    CleanerError, CleaningPipeline, OperationMode, ProcessingOptions, ProviderCredentials,
};

const ACCOUNTS: &str = "\
Account Id;Company Name;Website
001;Acme Inc;https://www.acme.com
002;ACME, Inc.;acme.com
003;Globex;sales@globex.com
004;Initech;
";

fn pipeline(provider: Arc<FakeProvider>) -> CleaningPipeline {
    CleaningPipeline::new(
        Arc::new(EnrichmentCache::memory_only()),
        ProviderCredentials::default(),
    )
    .with_enrichment_provider(provider)
    .with_queue_options(QueueOptions {
        row_delay: Duration::ZERO,
        ..Default::default()
    })
}

fn options(mode: OperationMode) -> ProcessingOptions {
    ProcessingOptions {
        operation_mode: mode,
        selected_columns: vec!["Company Name".to_string()],
        domain_column: Some("Website".to_string()),
        unique_identifier_column: Some("Account Id".to_string()),
        enrichment_fields: vec![EnrichmentField::Industry],
        ..Default::default()
    }
}

struct ConfirmEverything {
    calls: AtomicUsize,
}

#[async_trait]
impl MatchReviewer for ConfirmEverything {
    async fn review(
        &self,
        chunk: &[MatchResult],
        _columns: &[String],
    ) -> Result<Vec<usize>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..chunk.len()).collect())
    }
}

#[tokio::test]
async fn invalid_options_fail_before_any_work() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let mut opts = options(OperationMode::Both);
    opts.selected_columns.clear();

    let mut progress_calls = 0;
    let err = pipeline(provider.clone())
        .process_csv(ACCOUNTS, &opts, |_| progress_calls += 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CleanerError::Config(_)));
    assert_eq!(progress_calls, 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn malformed_csv_is_a_parse_error() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let err = pipeline(provider)
        .process_csv("Name\n\"unterminated", &options(OperationMode::DuplicatesOnly), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, CleanerError::Parse(_)));
}

#[tokio::test]
async fn enrich_only_skips_matching() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let mut progress = Vec::new();
    let outcome = pipeline(provider.clone())
        .process_csv(ACCOUNTS, &options(OperationMode::EnrichOnly), |p| progress.push(p))
        .await
        .unwrap();

    assert!(outcome.matches.is_empty());
    let enrichments = outcome.enrichments.as_ref().unwrap();
    assert_eq!(enrichments.len(), 4);
    assert_eq!(outcome.stats.enriched_rows, 3);
    // acme.com twice, but the second lookup is a cache hit.
    assert_eq!(provider.calls(), 2);
    assert!(enrichments[&1].is_from_cache());
    assert_eq!(outcome.rows[2].get("Enriched_Company"), "globex Corp");
    assert_eq!(outcome.rows[2].get("Enriched_Industry"), "industry of globex.com");
    assert!(!outcome.rows[3].contains("Enriched_Company"));
    assert_eq!(progress.last(), Some(&1.0));
}

#[tokio::test]
async fn duplicates_only_never_calls_the_provider() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let outcome = pipeline(provider.clone())
        .process_csv(ACCOUNTS, &options(OperationMode::DuplicatesOnly), |_| {})
        .await
        .unwrap();

    assert_eq!(provider.calls(), 0);
    assert!(outcome.enrichments.is_none());
    assert_eq!(outcome.matches.len(), 1);
    let m = &outcome.matches[0];
    assert_eq!((m.original_index, m.duplicate_index), (0, 1));
    assert_eq!(m.original_identifier.as_deref(), Some("001"));
    assert_eq!(outcome.stats.duplicates_found, 1);
    assert_eq!(outcome.stats.total_rows, 4);
}

#[tokio::test]
async fn both_modes_can_match_on_enriched_columns() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let mut opts = options(OperationMode::Both);
    opts.selected_columns = vec!["Enriched_Domain".to_string()];
    opts.fuzzy_threshold = 1.0;

    let mut progress = Vec::new();
    let outcome = pipeline(provider)
        .process_csv(ACCOUNTS, &opts, |p| progress.push(p))
        .await
        .unwrap();
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].id, "0-1");
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress.iter().any(|p| (*p - 0.2).abs() < 1e-9));
}

#[tokio::test]
async fn ai_review_upgrades_matches() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let reviewer = Arc::new(ConfirmEverything {
        calls: AtomicUsize::new(0),
    });
    let mut opts = options(OperationMode::DuplicatesOnly);
    opts.use_ai = true;
    opts.fuzzy_threshold = 0.5;

    let outcome = pipeline(provider)
        .with_reviewer(reviewer.clone())
        .process_csv(ACCOUNTS, &opts, |_| {})
        .await
        .unwrap();
    assert_eq!(reviewer.calls.load(Ordering::SeqCst), 1);
    assert!(!outcome.matches.is_empty());
    assert!(outcome.matches.iter().all(|m| m.match_type == MatchType::Ai));
    assert!(outcome.matches.iter().all(|m| m.confidence <= 1.0));
}

#[tokio::test]
async fn export_carries_decisions_and_enrichment_status() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi).failing_on(&["globex.com"]));
    let mut outcome = pipeline(provider)
        .process_csv(ACCOUNTS, &options(OperationMode::Both), |_| {})
        .await
        .unwrap();
    assert!(set_action(&mut outcome.matches, "0-1", MatchAction::Merge));

    let csv = outcome.export_csv().unwrap();
    let exported = parse_csv(&csv).unwrap();
    assert_eq!(&exported.headers[..3], &["Account Id", "Company Name", "Website"]);
    assert!(exported.headers.contains(&"ENRICHED_INDUSTRY".to_string()));
    assert_eq!(exported.rows[0].get(DUPLICATE_STATUS_COLUMN), "MERGE_MASTER");
    assert_eq!(exported.rows[1].get(DUPLICATE_STATUS_COLUMN), "MERGE_INTO_MASTER");
    assert_eq!(exported.rows[2].get(DUPLICATE_STATUS_COLUMN), "");
    assert!(exported.rows[2]
        .get(ENRICHED_STATUS_COLUMN)
        .starts_with("FAILED: "));
    assert_eq!(exported.rows[3].get(ENRICHED_STATUS_COLUMN), "FAILED: No domain value");
    assert_eq!(exported.rows[0].get("ENRICHED_COMPANY"), "acme Corp");
}

#[tokio::test]
async fn cancelled_pipeline_reports_cancellation() {
    init_logger();
    let provider = Arc::new(FakeProvider::new(ProviderKind::OpenAi));
    let pipeline = pipeline(provider);
    pipeline.cancellation_token().cancel();
    let err = pipeline
        .process_csv(ACCOUNTS, &options(OperationMode::Both), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, CleanerError::Cancelled));
}
