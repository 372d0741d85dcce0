// src/enrichment/domain.rs

use once_cell::sync::Lazy;
use regex::Regex;

// Tried in order: email address, URL, bare hostname.
static EMAIL_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("email pattern is valid")
});
static URL_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.)?([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("url pattern is valid")
});
static BARE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})$").expect("host pattern is valid")
});

/// Pulls a lowercased domain out of an email address, URL or bare hostname.
pub fn extract_domain(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    [&*EMAIL_DOMAIN, &*URL_DOMAIN, &*BARE_HOST]
        .iter()
        .find_map(|re| re.captures(value))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Lowercases and strips a leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Display name derived from a domain's first label: `my-great_co.io` becomes
/// `My Great Co`.
pub fn fallback_company_name(domain: &str) -> String {
    let normalized = normalize_domain(domain);
    let first_label = normalized.split('.').next().unwrap_or("");
    first_label
        .split(['-', '_'])
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
