// src/matching/normalize.rs

use once_cell::sync::Lazy;
use regex::Regex;

static LEGAL_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:inc|corp|corporation|ltd|limited|llc|co|company)\b\.?")
        .expect("legal suffix pattern is valid")
});
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Lowercases, strips legal-form words and punctuation, collapses whitespace.
pub fn normalize_company_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_suffix = LEGAL_SUFFIX.replace_all(&lowered, "");
    let without_punct = PUNCTUATION.replace_all(&without_suffix, "");
    WHITESPACE.replace_all(without_punct.trim(), " ").into_owned()
}

/// Columns whose header mentions a name or company are compared normalized.
pub fn is_name_column(header: &str) -> bool {
    let header = header.to_lowercase();
    header.contains("name") || header.contains("company")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_suffixes_and_punctuation() {
        assert_eq!(normalize_company_name("Acme Inc"), "acme");
        assert_eq!(normalize_company_name("ACME, Inc."), "acme");
        assert_eq!(normalize_company_name("Globex Corporation"), "globex");
        assert_eq!(normalize_company_name("Initech  Holdings   Ltd."), "initech holdings");
    }

    #[test]
    fn suffix_must_be_a_whole_word() {
        assert_eq!(normalize_company_name("Cohen Coffee"), "cohen coffee");
        assert_eq!(normalize_company_name("Incisive Media"), "incisive media");
    }

    #[test]
    fn name_column_detection_is_case_insensitive() {
        assert!(is_name_column("Account Name"));
        assert!(is_name_column("COMPANY"));
        assert!(!is_name_column("Website"));
    }
}
