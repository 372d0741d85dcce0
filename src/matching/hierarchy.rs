// src/matching/hierarchy.rs

use crate::models::{HierarchyType, Row};

// Third-party designation values (ZoomInfo / D&B style exports)
const GLOBAL_DESIGNATIONS: [&str; 2] = ["ultimate parent", "global parent"];
const REGIONAL_DESIGNATIONS: [&str; 2] = ["domestic parent", "regional parent"];
const SUBSIDIARY_DESIGNATIONS: [&str; 2] = ["subsidiary", "branch"];

// Name/description heuristics
const GLOBAL_INDICATORS: [&str; 5] = ["international", "worldwide", "global", "holdings", "group"];
const SUBSIDIARY_INDICATORS: [&str; 5] = ["subsidiary", "division", "branch", "unit", "dept"];

/// Classifies a single record's place in a corporate hierarchy.
///
/// Column lookups are case-insensitive. Indicator terms are matched as
/// substrings of the lowercased text.
#[derive(Debug, Clone)]
pub struct HierarchyClassifier {
    designation_columns: Vec<String>,
    name_columns: Vec<String>,
    description_columns: Vec<String>,
}

impl Default for HierarchyClassifier {
    fn default() -> Self {
        Self {
            designation_columns: vec!["DUP Designation".to_string()],
            name_columns: vec!["Company Name".to_string(), "Account Name".to_string()],
            description_columns: vec!["Description".to_string()],
        }
    }
}

impl HierarchyClassifier {
    pub fn new(
        designation_columns: Vec<String>,
        name_columns: Vec<String>,
        description_columns: Vec<String>,
    ) -> Self {
        Self {
            designation_columns,
            name_columns,
            description_columns,
        }
    }

    /// First non-empty value among `columns`, lowercased.
    fn first_value(row: &Row, columns: &[String]) -> String {
        columns
            .iter()
            .filter_map(|c| row.get_ignore_case(c))
            .find(|v| !v.trim().is_empty())
            .unwrap_or("")
            .to_lowercase()
    }

    pub fn classify(&self, row: &Row) -> HierarchyType {
        let designation = Self::first_value(row, &self.designation_columns);
        if !designation.is_empty() {
            if GLOBAL_DESIGNATIONS.iter().any(|d| designation.contains(d)) {
                return HierarchyType::GlobalParent;
            }
            if REGIONAL_DESIGNATIONS.iter().any(|d| designation.contains(d)) {
                return HierarchyType::RegionalParent;
            }
            if SUBSIDIARY_DESIGNATIONS.iter().any(|d| designation.contains(d)) {
                return HierarchyType::Subsidiary;
            }
        }

        let name = Self::first_value(row, &self.name_columns);
        let description = Self::first_value(row, &self.description_columns);
        let mentions = |term: &&str| name.contains(*term) || description.contains(*term);

        if GLOBAL_INDICATORS.iter().any(mentions) {
            HierarchyType::GlobalParent
        } else if SUBSIDIARY_INDICATORS.iter().any(mentions) {
            HierarchyType::Subsidiary
        } else {
            HierarchyType::Unknown
        }
    }
}
