// src/matching/similarity.rs

use strsim::levenshtein;

/// Normalized Levenshtein similarity in [0, 1], case-insensitive.
///
/// `(max_len - distance) / max_len` over Unicode scalar values; two empty
/// strings are identical. Case folding is `str::to_lowercase` only: accents
/// and transliterations are compared as distinct characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (max_len - distance) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("Acme", "Acme"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("ACME", "acme"), 1.0);
    }

    #[test]
    fn empty_against_non_empty_scores_zero() {
        assert_eq!(similarity("", "acme"), 0.0);
        assert_eq!(similarity("acme", ""), 0.0);
    }

    #[test]
    fn single_edit_is_normalized_by_longer_string() {
        // kitten -> sitting: distance 3, max length 7
        let s = similarity("kitten", "sitting");
        assert!((s - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn symmetric() {
        let pairs = [("acme", "acme corp"), ("globex", "initech"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        // one substitution over four characters
        assert!((similarity("café", "cafe") - 0.75).abs() < 1e-12);
    }
}
