// tests/duplicate_matching_tests.rs

mod common;

use std::collections::HashSet;

use common::{init_logger, row};
use crm_cleaner_lib::matching::{DuplicateMatcher, HierarchyClassifier, MatchingConfig};
use crm_cleaner_lib::models::{HierarchyType, MatchAction, MatchType, Row};

fn name_matcher(threshold: f64) -> DuplicateMatcher {
    DuplicateMatcher::new(MatchingConfig {
        selected_columns: vec!["Name".to_string()],
        fuzzy_threshold: threshold,
        hierarchy_detection: false,
        unique_identifier_column: None,
    })
}

fn names(values: &[&str]) -> Vec<Row> {
    values.iter().map(|v| row(&[("Name", v)])).collect()
}

#[test]
fn legal_suffix_variants_are_one_match() {
    init_logger();
    let rows = names(&["Acme Inc", "ACME, Inc.", "Globex"]);
    let matches = name_matcher(0.8).find_duplicates(&rows, |_| {});

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!((m.original_index, m.duplicate_index), (0, 1));
    assert!(m.confidence >= 0.9);
    assert!(matches!(m.match_type, MatchType::Exact | MatchType::Fuzzy));
    assert!(matches.iter().all(|m| m.original_index != 2 && m.duplicate_index != 2));
}

#[test]
fn zero_threshold_consumes_rows_greedily() {
    init_logger();
    let rows = names(&["Same", "Same", "Same"]);
    let matches = name_matcher(0.0).find_duplicates(&rows, |_| {});

    assert_eq!(matches.len(), 2);
    let pairs: HashSet<(usize, usize)> = matches
        .iter()
        .map(|m| (m.original_index, m.duplicate_index))
        .collect();
    assert_eq!(pairs, HashSet::from([(0, 1), (0, 2)]));
}

#[test]
fn repeated_runs_give_identical_results() {
    init_logger();
    let rows = names(&[
        "Initech", "Initek", "Acme Holdings", "Acme Holding", "Umbrella", "Umbrela Corp",
    ]);
    let matcher = name_matcher(0.7);
    let first = matcher.find_duplicates(&rows, |_| {});
    let second = matcher.find_duplicates(&rows, |_| {});
    assert_eq!(first, second);
}

#[test]
fn a_row_is_the_duplicate_side_at_most_once() {
    init_logger();
    let rows = names(&[
        "Acme", "Acme", "Acme Co", "Acme Corp", "Acme", "Globex", "Globex", "Acme",
    ]);
    let matches = name_matcher(0.5).find_duplicates(&rows, |_| {});

    let mut seen = HashSet::new();
    for m in &matches {
        assert!(m.original_index < m.duplicate_index);
        assert!(seen.insert(m.duplicate_index), "row {} consumed twice", m.duplicate_index);
        assert!(
            !seen.contains(&m.original_index),
            "consumed row {} used as an original",
            m.original_index
        );
    }
}

#[test]
fn confidences_stay_in_range_and_sorted() {
    init_logger();
    let rows = names(&["Alpha", "Alpah", "Beta Systems", "Beta System", "Gamma", "Gama"]);
    let matches = name_matcher(0.0).find_duplicates(&rows, |_| {});

    assert!(!matches.is_empty());
    for m in &matches {
        assert!((0.0..=1.0).contains(&m.confidence));
        assert_eq!(m.action, MatchAction::Pending);
        assert_eq!(m.id, format!("{}-{}", m.original_index, m.duplicate_index));
    }
    assert!(matches.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn multi_column_average_and_matched_fields() {
    init_logger();
    let matcher = DuplicateMatcher::new(MatchingConfig {
        selected_columns: vec!["Name".to_string(), "City".to_string(), "Name".to_string()],
        fuzzy_threshold: 0.5,
        hierarchy_detection: false,
        unique_identifier_column: None,
    });
    assert_eq!(matcher.config().selected_columns.len(), 2);

    let rows = vec![
        row(&[("Name", "Acme"), ("City", "Berlin")]),
        row(&[("Name", "Acme"), ("City", "Paris")]),
    ];
    let matches = matcher.find_duplicates(&rows, |_| {});
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_fields, vec!["Name".to_string()]);
    assert!(matches[0].confidence > 0.5 && matches[0].confidence < 1.0);
}

#[test]
fn hierarchy_uses_designation_before_name() {
    init_logger();
    let matcher = DuplicateMatcher::new(MatchingConfig {
        selected_columns: vec!["Company Name".to_string()],
        fuzzy_threshold: 0.6,
        hierarchy_detection: true,
        unique_identifier_column: None,
    })
    .with_classifier(HierarchyClassifier::default());

    let rows = vec![
        row(&[("Company Name", "Acme Europe"), ("DUP Designation", "Global Parent")]),
        row(&[("Company Name", "Acme Europe GmbH")]),
    ];
    let matches = matcher.find_duplicates(&rows, |_| {});
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].hierarchy_type, Some(HierarchyType::GlobalParent));
}

#[test]
fn unique_identifier_is_display_only() {
    init_logger();
    let matcher = DuplicateMatcher::new(MatchingConfig {
        selected_columns: vec!["Name".to_string()],
        fuzzy_threshold: 0.9,
        hierarchy_detection: false,
        unique_identifier_column: Some("Account Id".to_string()),
    });
    let rows = vec![
        row(&[("Name", "Acme"), ("Account Id", "001A")]),
        row(&[("Name", "Acme"), ("Account Id", "999Z")]),
    ];
    let matches = matcher.find_duplicates(&rows, |_| {});
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].confidence, 1.0);
    assert_eq!(matches[0].original_identifier.as_deref(), Some("001A"));
    assert_eq!(matches[0].duplicate_identifier.as_deref(), Some("999Z"));
}
