// src/matching/ai_review.rs

use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{AI_CONFIDENCE_BOOST, AI_REVIEW_MAX_CHUNK};
use crate::enrichment::prompt::{build_review_prompt, extract_json_object, REVIEW_SYSTEM_PROMPT};
use crate::enrichment::providers::{EnrichmentProvider, ProviderError};
use crate::error::{CleanerError, Result};
use crate::models::{MatchResult, MatchType};

/// Second opinion on a chunk of candidate matches.
#[async_trait]
pub trait MatchReviewer: Send + Sync {
    /// Positions within `chunk` confirmed as true duplicates.
    async fn review(
        &self,
        chunk: &[MatchResult],
        columns: &[String],
    ) -> std::result::Result<Vec<usize>, ProviderError>;
}

/// Reviewer backed by an LLM provider's raw completion call.
pub struct LlmMatchReviewer {
    provider: Arc<dyn EnrichmentProvider>,
}

impl LlmMatchReviewer {
    pub fn new(provider: Arc<dyn EnrichmentProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MatchReviewer for LlmMatchReviewer {
    async fn review(
        &self,
        chunk: &[MatchResult],
        columns: &[String],
    ) -> std::result::Result<Vec<usize>, ProviderError> {
        let prompt = build_review_prompt(chunk, columns);
        let answer = self.provider.complete(REVIEW_SYSTEM_PROMPT, &prompt).await?;
        let object = extract_json_object(&answer)
            .ok_or_else(|| ProviderError::Parse("no JSON object in review answer".to_string()))?;
        let confirmed = object
            .get("confirmed")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::Parse("review answer lacks 'confirmed'".to_string()))?;
        Ok(confirmed
            .iter()
            .filter_map(|v| v.as_u64())
            .map(|v| v as usize)
            .filter(|idx| *idx < chunk.len())
            .collect())
    }
}

/// Runs accepted matches past `reviewer` in chunks of `min(chunk_size, 10)`.
///
/// Confirmed matches become `ai` with a 10% confidence boost capped at 1.0.
/// A chunk whose review fails is kept unchanged. Order is preserved.
pub async fn enhance_matches<R, F>(
    reviewer: &R,
    matches: Vec<MatchResult>,
    columns: &[String],
    chunk_size: usize,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<Vec<MatchResult>>
where
    R: MatchReviewer + ?Sized,
    F: FnMut(f64),
{
    let total = matches.len();
    if total == 0 {
        return Ok(matches);
    }
    let chunk_size = chunk_size.clamp(1, AI_REVIEW_MAX_CHUNK);
    info!(
        "Reviewing {} matches with AI in chunks of {}",
        total, chunk_size
    );

    let mut enhanced = Vec::with_capacity(total);
    let mut upgraded = 0usize;
    let mut done = 0usize;
    for chunk in matches.chunks(chunk_size) {
        if cancel.is_cancelled() {
            return Err(CleanerError::Cancelled);
        }
        match reviewer.review(chunk, columns).await {
            Ok(confirmed) => {
                let confirmed: HashSet<usize> = confirmed.into_iter().collect();
                for (idx, m) in chunk.iter().enumerate() {
                    let mut m = m.clone();
                    if confirmed.contains(&idx) {
                        m.match_type = MatchType::Ai;
                        m.confidence = (m.confidence * AI_CONFIDENCE_BOOST).min(1.0);
                        upgraded += 1;
                    }
                    enhanced.push(m);
                }
            }
            Err(e) => {
                warn!(
                    "AI review failed for matches {}..{}: {}. Keeping fuzzy results.",
                    done,
                    done + chunk.len(),
                    e
                );
                enhanced.extend_from_slice(chunk);
            }
        }
        done += chunk.len();
        on_progress(done as f64 / total as f64);
    }

    debug!("AI review upgraded {} of {} matches", upgraded, total);
    Ok(enhanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchAction, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(n: usize) -> Vec<MatchResult> {
        (0..n)
            .map(|i| MatchResult {
                id: format!("{}-{}", i, i + 100),
                original_index: i,
                duplicate_index: i + 100,
                original_row: Row::new(),
                duplicate_row: Row::new(),
                confidence: 0.95,
                match_type: MatchType::Fuzzy,
                matched_fields: vec![],
                hierarchy_type: None,
                action: MatchAction::Pending,
                original_identifier: None,
                duplicate_identifier: None,
            })
            .collect()
    }

    struct ConfirmAll {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl MatchReviewer for ConfirmAll {
        async fn review(
            &self,
            chunk: &[MatchResult],
            _columns: &[String],
        ) -> std::result::Result<Vec<usize>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on_call {
                return Err(ProviderError::Transport("boom".into()));
            }
            Ok((0..chunk.len()).collect())
        }
    }

    #[tokio::test]
    async fn chunks_are_capped_at_ten() {
        let reviewer = ConfirmAll { calls: AtomicUsize::new(0), fail_on_call: None };
        let out = enhance_matches(&reviewer, sample(25), &[], 500, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(reviewer.calls.load(Ordering::SeqCst), 3);
        assert!(out.iter().all(|m| m.match_type == MatchType::Ai));
        assert!(out.iter().all(|m| m.confidence == 1.0));
    }

    #[tokio::test]
    async fn failed_chunk_keeps_original_matches() {
        let reviewer = ConfirmAll { calls: AtomicUsize::new(0), fail_on_call: Some(1) };
        let out = enhance_matches(&reviewer, sample(4), &[], 2, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        let types: Vec<_> = out.iter().map(|m| m.match_type).collect();
        assert_eq!(
            types,
            vec![MatchType::Ai, MatchType::Ai, MatchType::Fuzzy, MatchType::Fuzzy]
        );
        assert_eq!(out[2].confidence, 0.95);
        assert_eq!(out[3].id, "3-103");
    }

    #[tokio::test]
    async fn progress_reaches_one() {
        let reviewer = ConfirmAll { calls: AtomicUsize::new(0), fail_on_call: None };
        let mut last = 0.0;
        enhance_matches(&reviewer, sample(3), &[], 2, &CancellationToken::new(), |p| last = p)
            .await
            .unwrap();
        assert_eq!(last, 1.0);
    }
}
