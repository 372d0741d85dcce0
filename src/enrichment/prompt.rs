// src/enrichment/prompt.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{CompanyProfile, EnrichmentField, EnrichmentMode, MatchResult, Row};

pub const ENRICHMENT_SYSTEM_PROMPT: &str = "You are an expert business intelligence researcher. \
Find detailed, accurate and current information about companies. Respond with only valid JSON, \
no markdown or additional text.";

pub const REVIEW_SYSTEM_PROMPT: &str = "You review CRM records for duplicates. \
Respond with only valid JSON, no markdown or additional text.";

fn field_instruction(field: EnrichmentField) -> &'static str {
    match field {
        EnrichmentField::Industry => "**industry**: Be specific (e.g., 'Enterprise SaaS - Customer Relationship Management' not just 'Software')",
        EnrichmentField::Vertical => "**vertical**: The specific market vertical or sector they serve (e.g., 'Healthcare Technology', 'Financial Services', 'E-commerce')",
        EnrichmentField::Employees => "**employeeCount**: Current employee count as a range: '1-10', '11-50', '51-200', '201-500', '501-1000', '1001-5000', '5001-10000', '10000+'",
        EnrichmentField::Hq => "**headquarters**: Full location 'City, State/Province, Country' (e.g., 'San Francisco, California, USA')",
        EnrichmentField::HqCountry => "**hqCountry**: Country where headquarters is located (e.g., 'USA', 'United Kingdom', 'Germany')",
        EnrichmentField::Description => "**description**: 2-3 detailed sentences covering products/services and target market",
        EnrichmentField::ShortDescription => "**shortDescription**: 1 concise sentence (max 15 words) describing what the company does",
        EnrichmentField::Founded => "**founded**: Founding year (e.g., '2010')",
        EnrichmentField::FoundedCountry => "**foundedCountry**: Country where the company was founded",
        EnrichmentField::Revenue => "**revenue**: Annual revenue range with currency: '<$1M', '$1M-5M', '$5M-10M', '$10M-50M', '$50M-100M', '$100M-500M', '$500M-1B', '$1B+'",
        EnrichmentField::Funding => "**funding**: Total funding raised (e.g., '$50M', 'Bootstrapped')",
        EnrichmentField::FundingType => "**fundingType**: Latest funding round type (e.g., 'Series A', 'IPO', 'Acquired', 'Bootstrapped')",
        EnrichmentField::FundingStage => "**fundingStage**: One of 'Pre-seed', 'Seed', 'Series A' through 'Series G', 'Growth', 'Established', 'Unknown', 'Not Applicable'",
        EnrichmentField::BusinessType => "**businessType**: One of 'Digital Native', 'Digitally Transformed', 'Traditional'",
        EnrichmentField::RevenueModel => "**revenueModel**: Primary revenue model (e.g., 'Subscription', 'B2B Sales', 'Marketplace', 'Licensing', 'Hybrid')",
        EnrichmentField::CompanyStage => "**companyStage**: One of 'Startup', 'Growth', 'Established'",
        EnrichmentField::TickerSymbol => "**tickerSymbol**: Stock ticker symbol if publicly traded, otherwise omit",
    }
}

/// Canonical field list: catalogue order, no repeats.
pub fn canonical_fields(fields: &[EnrichmentField]) -> Vec<EnrichmentField> {
    let mut out = fields.to_vec();
    out.sort();
    out.dedup();
    out
}

/// Research prompt asking for the company name plus the requested fields.
pub fn build_enrichment_prompt(
    subject: &str,
    mode: EnrichmentMode,
    fields: &[EnrichmentField],
) -> String {
    let target = match mode {
        EnrichmentMode::Domain => format!("the company with domain \"{}\"", subject),
        EnrichmentMode::Company => format!("the company named \"{}\"", subject),
    };
    let mut prompt = format!(
        "Research {} thoroughly using its website, company databases and recent news. \
         Provide specific information:\n\n\
         1. **companyName**: Full official company name (legal name if different from brand)\n",
        target
    );
    for (idx, field) in canonical_fields(fields).into_iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 2, field_instruction(field)));
    }
    prompt.push_str(
        "\nReturn ONLY valid JSON with the requested fields. \
         If a field is not available, omit it or use null.",
    );
    prompt
}

/// Prompt asking an LLM to confirm which candidate pairs are real duplicates.
pub fn build_review_prompt(chunk: &[MatchResult], columns: &[String]) -> String {
    let relevant = |row: &Row| -> serde_json::Map<String, Value> {
        columns
            .iter()
            .filter(|c| !row.get(c).is_empty())
            .map(|c| (c.clone(), Value::String(row.get(c).to_string())))
            .collect()
    };
    let candidates: Vec<Value> = chunk
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            serde_json::json!({
                "index": idx,
                "original": relevant(&m.original_row),
                "duplicate": relevant(&m.duplicate_row),
                "confidence": m.confidence,
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&candidates).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze the following potential duplicate CRM records. Consider company name \
         variations, address similarities and business relationships.\n\n\
         Columns analyzed: {}\n\nCandidates:\n{}\n\n\
         Respond with JSON of the form {{\"confirmed\": [indices of true duplicates]}}.",
        columns.join(", "),
        rendered
    )
}

/// The first `{` through the last `}` of a model answer, parsed as JSON.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Flattens a JSON scalar into display text. Null and blank values are absent.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Reads `companyName` and the requested fields out of a provider's JSON.
pub fn parse_profile(
    object: &Value,
    fields: &[EnrichmentField],
) -> (Option<String>, CompanyProfile) {
    let company_name = object.get("companyName").and_then(value_text);
    let mut profile = CompanyProfile::default();
    for field in fields {
        if let Some(text) = object.get(field.json_key()).and_then(value_text) {
            profile.set(*field, text);
        }
    }
    (company_name, profile)
}

static NAMED_COMPANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:company name|called|named)\s*[:"]?\s*([^,.\n"]+)"#)
        .expect("company name pattern is valid")
});

/// Best-effort company name from a free-text answer.
pub fn extract_company_name_from_text(text: &str) -> Option<String> {
    NAMED_COMPANY
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}
