// src/results.rs

use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::csv_parser::write_csv;
use crate::error::Result;
use crate::models::{
    CsvTable, EnrichmentField, EnrichmentResult, HierarchyType, MatchAction, MatchResult, Row,
};

pub const DUPLICATE_STATUS_COLUMN: &str = "DUPLICATE_STATUS";
pub const MATCH_CONFIDENCE_COLUMN: &str = "MATCH_CONFIDENCE";
pub const ENRICHED_STATUS_COLUMN: &str = "ENRICHED_STATUS";

/// Summary of one processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub total_rows: usize,
    pub processed_rows: usize,
    pub duplicates_found: usize,
    /// Matches carrying a known hierarchy position
    pub hierarchies_identified: usize,
    pub enriched_rows: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn from_run(
        total_rows: usize,
        matches: &[MatchResult],
        enrichments: Option<&BTreeMap<usize, EnrichmentResult>>,
        processing_time: Duration,
    ) -> Self {
        let hierarchies_identified = matches
            .iter()
            .filter(|m| {
                m.hierarchy_type
                    .is_some_and(|h| h != HierarchyType::Unknown)
            })
            .count();
        let enriched_rows = enrichments
            .map(|e| e.values().filter(|r| r.success).count())
            .unwrap_or(0);
        Self {
            total_rows,
            processed_rows: total_rows,
            duplicates_found: matches.len(),
            hierarchies_identified,
            enriched_rows,
            processing_time,
        }
    }
}

//------------------------------------------------------------------------------
// AUGMENTED ROWS
//------------------------------------------------------------------------------

/// `Enriched_HQ_Country`, `Enriched_Employee_Count`, ...
pub fn augmented_column(field: EnrichmentField) -> String {
    let words: Vec<String> = field
        .column_suffix()
        .split('_')
        .map(|word| {
            if word == "HQ" {
                return word.to_string();
            }
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("Enriched_{}", words.join("_"))
}

/// Every column an augmented row may carry, in canonical order. Lets the host
/// offer enrichment output as duplicate-matching columns.
pub fn augmented_columns() -> Vec<String> {
    let mut columns = vec!["Enriched_Company".to_string(), "Enriched_Domain".to_string()];
    columns.extend(EnrichmentField::ALL.into_iter().map(augmented_column));
    columns
}

/// Copies of `rows` with enrichment output added as `Enriched_*` columns.
///
/// Only successful results with a company name contribute; other rows are
/// returned unchanged. Inputs are never modified.
pub fn augment_rows(rows: &[Row], enrichments: &BTreeMap<usize, EnrichmentResult>) -> Vec<Row> {
    let mut augmented_count = 0usize;
    let augmented = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let Some(result) = enrichments.get(&index).filter(|r| r.success) else {
                return row.clone();
            };
            let Some(company) = result.company_name.as_deref() else {
                return row.clone();
            };
            augmented_count += 1;
            let mut extra = vec![
                ("Enriched_Company".to_string(), company.to_string()),
                ("Enriched_Domain".to_string(), result.normalized_domain.clone()),
            ];
            extra.extend(
                result
                    .profile
                    .populated()
                    .map(|(field, value)| (augmented_column(field), value.to_string())),
            );
            row.with_columns(extra)
        })
        .collect();
    debug!("Augmented {} of {} rows with enrichment data", augmented_count, rows.len());
    augmented
}

//------------------------------------------------------------------------------
// EXPORT
//------------------------------------------------------------------------------

/// `DUPLICATE_STATUS` for row `index`, derived from the user's decisions.
///
/// Explicit delete/merge decisions win over the generic action of whichever
/// match mentions the row first.
pub fn duplicate_status(index: usize, matches: &[MatchResult]) -> String {
    let as_original = matches.iter().find(|m| m.original_index == index);
    let as_duplicate = matches.iter().find(|m| m.duplicate_index == index);

    if as_original.is_some_and(|m| m.action == MatchAction::Delete) {
        return "DELETE_ORIGINAL".to_string();
    }
    if as_duplicate.is_some_and(|m| m.action == MatchAction::Delete) {
        return "DELETE_DUPLICATE".to_string();
    }
    if as_original.is_some_and(|m| m.action == MatchAction::Merge) {
        return "MERGE_MASTER".to_string();
    }
    if as_duplicate.is_some_and(|m| m.action == MatchAction::Merge) {
        return "MERGE_INTO_MASTER".to_string();
    }
    as_original
        .or(as_duplicate)
        .map(|m| m.action.as_str().to_uppercase())
        .unwrap_or_default()
}

fn match_confidence(index: usize, matches: &[MatchResult]) -> String {
    matches
        .iter()
        .find(|m| m.original_index == index || m.duplicate_index == index)
        .map(|m| format!("{:.1}%", m.confidence * 100.0))
        .unwrap_or_default()
}

/// Builds the export table: the original columns in file order, then status
/// columns, then (when enrichment ran) the `ENRICHED_*` block.
///
/// Failed enrichments are reported in `ENRICHED_STATUS` as `FAILED: <error>`.
pub fn build_export(
    headers: &[String],
    rows: &[Row],
    matches: &[MatchResult],
    enrichments: Option<&BTreeMap<usize, EnrichmentResult>>,
) -> CsvTable {
    let mut export_headers: Vec<String> = headers.to_vec();
    export_headers.push(DUPLICATE_STATUS_COLUMN.to_string());
    export_headers.push(MATCH_CONFIDENCE_COLUMN.to_string());
    if enrichments.is_some() {
        export_headers.push("ENRICHED_COMPANY".to_string());
        export_headers.push("ENRICHED_DOMAIN".to_string());
        export_headers.extend(
            EnrichmentField::ALL
                .into_iter()
                .map(|f| format!("ENRICHED_{}", f.column_suffix())),
        );
        export_headers.push(ENRICHED_STATUS_COLUMN.to_string());
    }

    let export_rows = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut out: Row = headers
                .iter()
                .map(|h| (h.clone(), row.get(h).to_string()))
                .collect();
            out.0.insert(DUPLICATE_STATUS_COLUMN.to_string(), duplicate_status(index, matches));
            out.0.insert(MATCH_CONFIDENCE_COLUMN.to_string(), match_confidence(index, matches));

            if let Some(enrichments) = enrichments {
                let result = enrichments.get(&index);
                let succeeded = result.filter(|r| r.success);
                out.0.insert(
                    "ENRICHED_COMPANY".to_string(),
                    succeeded
                        .and_then(|r| r.company_name.clone())
                        .unwrap_or_default(),
                );
                out.0.insert(
                    "ENRICHED_DOMAIN".to_string(),
                    succeeded
                        .map(|r| r.normalized_domain.clone())
                        .unwrap_or_default(),
                );
                for field in EnrichmentField::ALL {
                    let value = succeeded
                        .and_then(|r| r.profile.get(field))
                        .unwrap_or("");
                    out.0
                        .insert(format!("ENRICHED_{}", field.column_suffix()), value.to_string());
                }
                let status = match result {
                    Some(r) if !r.success => {
                        format!("FAILED: {}", r.error.as_deref().unwrap_or("unknown error"))
                    }
                    _ => String::new(),
                };
                out.0.insert(ENRICHED_STATUS_COLUMN.to_string(), status);
            }
            out
        })
        .collect();

    CsvTable {
        headers: export_headers,
        rows: export_rows,
    }
}

/// [`build_export`] rendered as CSV text.
pub fn export_csv(
    headers: &[String],
    rows: &[Row],
    matches: &[MatchResult],
    enrichments: Option<&BTreeMap<usize, EnrichmentResult>>,
) -> Result<String> {
    let table = build_export(headers, rows, matches, enrichments);
    let csv = write_csv(&table.headers, &table.rows)?;
    info!(
        "Exported {} rows with {} columns",
        table.rows.len(),
        table.headers.len()
    );
    Ok(csv)
}

//------------------------------------------------------------------------------
// REVIEW HELPERS
//------------------------------------------------------------------------------

/// Rows sharing the same successfully enriched domain, for domains seen more
/// than once.
pub fn find_domain_matches(
    enrichments: &BTreeMap<usize, EnrichmentResult>,
) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, result) in enrichments {
        if result.success && !result.normalized_domain.is_empty() {
            groups
                .entry(result.normalized_domain.clone())
                .or_default()
                .push(*index);
        }
    }
    groups.retain(|_, indices| indices.len() > 1);
    groups
}

/// Records a user decision on one match. Returns false if `id` is unknown.
pub fn set_action(matches: &mut [MatchResult], id: &str, action: MatchAction) -> bool {
    match matches.iter_mut().find(|m| m.id == id) {
        Some(m) => {
            m.action = action;
            true
        }
        None => false,
    }
}

/// Applies one decision to every listed match, returning how many changed.
pub fn set_bulk_action(matches: &mut [MatchResult], ids: &[String], action: MatchAction) -> usize {
    let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut updated = 0;
    for m in matches.iter_mut().filter(|m| ids.contains(m.id.as_str())) {
        m.action = action;
        updated += 1;
    }
    debug!("Set action '{}' on {} matches", action.as_str(), updated);
    updated
}
