// src/matching/duplicates.rs

use log::{debug, info, trace};
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{
    DEFAULT_FUZZY_THRESHOLD, EXACT_MATCH_THRESHOLD, MATCHED_FIELD_THRESHOLD,
    MATCHER_YIELD_EVERY_ROWS,
};
use crate::error::{CleanerError, Result};
use crate::matching::hierarchy::HierarchyClassifier;
use crate::matching::normalize::{is_name_column, normalize_company_name};
use crate::matching::similarity::similarity;
use crate::models::{MatchAction, MatchResult, MatchType, Row};

/// Settings for one duplicate-detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub selected_columns: Vec<String>,
    /// Minimum average field similarity for a pair to be reported
    pub fuzzy_threshold: f64,
    pub hierarchy_detection: bool,
    /// Display-only identifier column, never compared
    pub unique_identifier_column: Option<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            selected_columns: Vec::new(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            hierarchy_detection: true,
            unique_identifier_column: None,
        }
    }
}

/// Per-pair score before acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub confidence: f64,
    pub matched_fields: Vec<String>,
}

/// Greedy pairwise matcher over all rows.
///
/// Every unconsumed pair `(i, j)` with `i < j` is compared in order. An accepted
/// pair consumes `j`, so a row is the duplicate side of at most one match and
/// is never paired again.
#[derive(Debug, Clone)]
pub struct DuplicateMatcher {
    config: MatchingConfig,
    classifier: HierarchyClassifier,
}

impl DuplicateMatcher {
    pub fn new(mut config: MatchingConfig) -> Self {
        // Duplicate selections would double-weight a column.
        let mut seen = HashSet::new();
        config.selected_columns.retain(|c| seen.insert(c.clone()));
        Self {
            config,
            classifier: HierarchyClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: HierarchyClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Scores two rows over the selected columns.
    ///
    /// Values are compared as stored, surrounding whitespace included. Columns
    /// empty on both sides are skipped. Returns `None` when nothing was compared.
    pub fn score_pair(&self, a: &Row, b: &Row) -> Option<PairScore> {
        let mut total = 0.0;
        let mut compared = 0usize;
        let mut matched_fields = Vec::new();

        for column in &self.config.selected_columns {
            let left = a.get(column);
            let right = b.get(column);
            if left.is_empty() && right.is_empty() {
                continue;
            }
            let score = if is_name_column(column) {
                similarity(&normalize_company_name(left), &normalize_company_name(right))
            } else {
                similarity(left, right)
            };
            total += score;
            compared += 1;
            if score > MATCHED_FIELD_THRESHOLD {
                matched_fields.push(column.clone());
            }
        }

        if compared == 0 {
            return None;
        }
        Some(PairScore {
            confidence: (total / compared as f64).clamp(0.0, 1.0),
            matched_fields,
        })
    }

    /// Compares `rows[i]` with `rows[j]` and builds a match if the pair clears
    /// the threshold.
    pub fn compare_rows(&self, rows: &[Row], i: usize, j: usize) -> Option<MatchResult> {
        let original = rows.get(i)?;
        let duplicate = rows.get(j)?;
        let score = self.score_pair(original, duplicate)?;
        if score.confidence < self.config.fuzzy_threshold {
            return None;
        }

        let identifier = |row: &Row| {
            self.config
                .unique_identifier_column
                .as_deref()
                .map(|col| row.get(col).to_string())
        };

        Some(MatchResult {
            id: format!("{}-{}", i, j),
            original_index: i,
            duplicate_index: j,
            original_row: original.clone(),
            duplicate_row: duplicate.clone(),
            confidence: score.confidence,
            match_type: if score.confidence > EXACT_MATCH_THRESHOLD {
                MatchType::Exact
            } else {
                MatchType::Fuzzy
            },
            matched_fields: score.matched_fields,
            hierarchy_type: self
                .config
                .hierarchy_detection
                .then(|| self.classifier.classify(original)),
            action: MatchAction::Pending,
            original_identifier: identifier(original),
            duplicate_identifier: identifier(duplicate),
        })
    }

    /// Runs the full scan. `on_progress` receives `i / n` on every outer row.
    pub fn find_duplicates<F>(&self, rows: &[Row], on_progress: F) -> Vec<MatchResult>
    where
        F: FnMut(f64),
    {
        let mut scan = MatchScan::new(self, rows, None, on_progress);
        while scan.step() {}
        // No token, so the scan cannot be cancelled.
        scan.finish().unwrap_or_default()
    }

    /// Same scan, checking `cancel` before every outer row and every pair.
    pub fn find_duplicates_cancellable<F>(
        &self,
        rows: &[Row],
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<Vec<MatchResult>>
    where
        F: FnMut(f64),
    {
        let mut scan = MatchScan::new(self, rows, Some(cancel), on_progress);
        while scan.step() {}
        scan.finish()
    }

    /// Async variant for UI-embedded hosts: yields to the runtime every few
    /// outer rows. Comparison order and results are unchanged.
    pub async fn find_duplicates_async<F>(
        &self,
        rows: &[Row],
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<Vec<MatchResult>>
    where
        F: FnMut(f64),
    {
        let mut scan = MatchScan::new(self, rows, Some(cancel), on_progress);
        let mut steps = 0usize;
        while scan.step() {
            steps += 1;
            if steps % MATCHER_YIELD_EVERY_ROWS == 0 {
                tokio::task::yield_now().await;
            }
        }
        scan.finish()
    }
}

/// Resumable state of one scan. Each `step` handles one outer row.
struct MatchScan<'a, F> {
    matcher: &'a DuplicateMatcher,
    rows: &'a [Row],
    cancel: Option<&'a CancellationToken>,
    on_progress: F,
    consumed: Vec<bool>,
    matches: Vec<MatchResult>,
    next_row: usize,
    comparisons: u64,
    cancelled: bool,
    started: Instant,
}

impl<'a, F: FnMut(f64)> MatchScan<'a, F> {
    fn new(
        matcher: &'a DuplicateMatcher,
        rows: &'a [Row],
        cancel: Option<&'a CancellationToken>,
        on_progress: F,
    ) -> Self {
        info!(
            "Finding duplicates among {} rows on columns {:?} (threshold {:.2})",
            rows.len(),
            matcher.config.selected_columns,
            matcher.config.fuzzy_threshold
        );
        Self {
            matcher,
            rows,
            cancel,
            on_progress,
            consumed: vec![false; rows.len()],
            matches: Vec::new(),
            next_row: 0,
            comparisons: 0,
            cancelled: false,
            started: Instant::now(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancellationToken::is_cancelled)
    }

    /// Processes the next outer row. Returns false once the scan is over.
    fn step(&mut self) -> bool {
        let n = self.rows.len();
        if self.next_row >= n || self.cancelled {
            return false;
        }
        if self.is_cancelled() {
            self.cancelled = true;
            return false;
        }

        let i = self.next_row;
        self.next_row += 1;
        (self.on_progress)(i as f64 / n as f64);
        if self.consumed[i] {
            return true;
        }

        for j in (i + 1)..n {
            if self.consumed[j] {
                continue;
            }
            if self.is_cancelled() {
                self.cancelled = true;
                return false;
            }
            self.comparisons += 1;
            if let Some(found) = self.matcher.compare_rows(self.rows, i, j) {
                trace!(
                    "Match {} accepted with confidence {:.3}",
                    found.id, found.confidence
                );
                self.consumed[j] = true;
                self.matches.push(found);
            }
        }
        true
    }

    fn finish(mut self) -> Result<Vec<MatchResult>> {
        if self.cancelled {
            info!(
                "Duplicate scan cancelled after {} of {} rows",
                self.next_row,
                self.rows.len()
            );
            return Err(CleanerError::Cancelled);
        }
        (self.on_progress)(1.0);
        // Stable: equal confidences keep discovery order.
        self.matches
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!("Compared {} row pairs", self.comparisons);
        info!(
            "Found {} duplicate candidates among {} rows in {:.2?}",
            self.matches.len(),
            self.rows.len(),
            self.started.elapsed()
        );
        Ok(self.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HierarchyType;

    fn rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|n| [("Name", *n)].into_iter().collect())
            .collect()
    }

    fn matcher(threshold: f64) -> DuplicateMatcher {
        DuplicateMatcher::new(MatchingConfig {
            selected_columns: vec!["Name".to_string()],
            fuzzy_threshold: threshold,
            hierarchy_detection: false,
            unique_identifier_column: None,
        })
    }

    #[test]
    fn legal_suffix_variants_match_exactly() {
        let data = rows(&["Acme Inc", "ACME, Inc.", "Globex"]);
        let found = matcher(0.8).find_duplicates(&data, |_| {});
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "0-1");
        assert_eq!(found[0].match_type, MatchType::Exact);
        assert_eq!(found[0].matched_fields, vec!["Name".to_string()]);
        assert_eq!(found[0].action, MatchAction::Pending);
        assert!(found[0].hierarchy_type.is_none());
    }

    #[test]
    fn both_empty_columns_are_skipped() {
        let m = DuplicateMatcher::new(MatchingConfig {
            selected_columns: vec!["Name".to_string(), "Phone".to_string()],
            fuzzy_threshold: 0.9,
            ..Default::default()
        });
        let a: Row = [("Name", "Acme"), ("Phone", "")].into_iter().collect();
        let b: Row = [("Name", "Acme")].into_iter().collect();
        let score = m.score_pair(&a, &b).unwrap();
        assert_eq!(score.confidence, 1.0);
    }

    #[test]
    fn one_sided_values_count_as_zero() {
        let m = DuplicateMatcher::new(MatchingConfig {
            selected_columns: vec!["Name".to_string(), "Phone".to_string()],
            fuzzy_threshold: 0.0,
            ..Default::default()
        });
        let a: Row = [("Name", "Acme"), ("Phone", "555")].into_iter().collect();
        let b: Row = [("Name", "Acme")].into_iter().collect();
        let score = m.score_pair(&a, &b).unwrap();
        assert_eq!(score.confidence, 0.5);
        assert_eq!(score.matched_fields, vec!["Name".to_string()]);
    }

    #[test]
    fn rows_with_no_values_never_match() {
        let data = rows(&["", "", ""]);
        assert!(matcher(0.0).find_duplicates(&data, |_| {}).is_empty());
    }

    #[test]
    fn zero_threshold_is_greedy_not_transitive() {
        let data = rows(&["Same", "Same", "Same"]);
        let found = matcher(0.0).find_duplicates(&data, |_| {});
        let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["0-1", "0-2"]);
    }

    #[test]
    fn hierarchy_comes_from_original_row() {
        let m = DuplicateMatcher::new(MatchingConfig {
            selected_columns: vec!["Company Name".to_string()],
            fuzzy_threshold: 0.5,
            hierarchy_detection: true,
            unique_identifier_column: Some("Id".to_string()),
        });
        let data: Vec<Row> = vec![
            [("Company Name", "Acme Holdings"), ("Id", "001")].into_iter().collect(),
            [("Company Name", "Acme Holdings Ltd"), ("Id", "002")].into_iter().collect(),
        ];
        let found = m.find_duplicates(&data, |_| {});
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hierarchy_type, Some(HierarchyType::GlobalParent));
        assert_eq!(found[0].original_identifier.as_deref(), Some("001"));
        assert_eq!(found[0].duplicate_identifier.as_deref(), Some("002"));
    }

    #[test]
    fn results_sorted_by_confidence_descending() {
        let data = rows(&["Initech", "Initek", "Acme", "Acme"]);
        let found = matcher(0.7).find_duplicates(&data, |_| {});
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "2-3");
        assert_eq!(found[1].id, "0-1");
    }

    #[test]
    fn progress_reported_for_every_outer_row() {
        let data = rows(&["a", "b", "c", "d"]);
        let mut seen = Vec::new();
        matcher(0.8).find_duplicates(&data, |p| seen.push(p));
        assert_eq!(seen, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn surrounding_whitespace_counts_as_a_difference() {
        let code = DuplicateMatcher::new(MatchingConfig {
            selected_columns: vec!["Code".to_string()],
            fuzzy_threshold: 0.8,
            hierarchy_detection: false,
            unique_identifier_column: None,
        });
        let row = |v: &str| -> Row { [("Code", v)].into_iter().collect() };

        let score = code.score_pair(&row("AB "), &row("AB")).unwrap();
        assert!((score.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!(score.matched_fields.is_empty());
        assert!(code.find_duplicates(&[row("AB "), row("AB")], |_| {}).is_empty());

        // Whitespace is a value: compared against empty, it scores zero.
        let blank = code.score_pair(&row(" "), &row("")).unwrap();
        assert_eq!(blank.confidence, 0.0);
        assert!(code.score_pair(&row(""), &row("")).is_none());
    }

    #[test]
    fn cancelled_token_stops_the_scan() {
        let data = rows(&["a", "b"]);
        let token = CancellationToken::new();
        token.cancel();
        let err = matcher(0.0)
            .find_duplicates_cancellable(&data, &token, |_| {})
            .unwrap_err();
        assert!(matches!(err, CleanerError::Cancelled));
    }

    #[tokio::test]
    async fn async_scan_matches_sync_scan() {
        let names: Vec<String> = (0..120).map(|i| format!("Company {}", i % 7)).collect();
        let data: Vec<Row> = names
            .iter()
            .map(|n| [("Name", n.as_str())].into_iter().collect())
            .collect();
        let m = matcher(0.9);
        let sync = m.find_duplicates(&data, |_| {});
        let token = CancellationToken::new();
        let asynced = m.find_duplicates_async(&data, &token, |_| {}).await.unwrap();
        assert_eq!(sync, asynced);
    }
}
