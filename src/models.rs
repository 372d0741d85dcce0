// src/models.rs

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//------------------------------------------------------------------------------
// INPUT RECORDS
//------------------------------------------------------------------------------

/// One CRM record: column name to string value.
///
/// Rows are never mutated once parsed. Enrichment produces a new, augmented row
/// via [`Row::with_columns`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub HashMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Value of `column`, or the empty string when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.0.get(column).map(String::as_str).unwrap_or("")
    }

    /// Case-insensitive column lookup, used for well-known columns such as
    /// "Company Name" whose casing varies between CRM exports.
    pub fn get_ignore_case(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(column))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of this row with `extra` columns added (or overwritten).
    pub fn with_columns<I, K, V>(&self, extra: I) -> Row
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = self.0.clone();
        for (k, v) in extra {
            values.insert(k.into(), v.into());
        }
        Row(values)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Row(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A parsed CSV file. `headers` keeps the file's column order for export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

//------------------------------------------------------------------------------
// DUPLICATE MATCHING
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Ai,
}

/// Coarse position of a company record in a corporate ownership structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyType {
    GlobalParent,
    RegionalParent,
    Subsidiary,
    Unknown,
}

impl HierarchyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyType::GlobalParent => "global_parent",
            HierarchyType::RegionalParent => "regional_parent",
            HierarchyType::Subsidiary => "subsidiary",
            HierarchyType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HierarchyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User decision on a match. Always `Pending` when the matcher creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAction {
    Keep,
    Merge,
    Delete,
    #[default]
    Pending,
}

impl MatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchAction::Keep => "keep",
            MatchAction::Merge => "merge",
            MatchAction::Delete => "delete",
            MatchAction::Pending => "pending",
        }
    }
}

/// A duplicate candidate produced by the pairwise matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// `"{i}-{j}"` for the compared row indices, unique per run
    pub id: String,
    /// Index of the earlier row in the comparison order
    pub original_index: usize,
    /// Index of the row consumed as the duplicate
    pub duplicate_index: usize,
    pub original_row: Row,
    pub duplicate_row: Row,
    /// Average per-field similarity, in [0, 1]
    pub confidence: f64,
    pub match_type: MatchType,
    /// Compared columns whose similarity exceeded the matched-field cutoff
    pub matched_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy_type: Option<HierarchyType>,
    pub action: MatchAction,
    /// Display-only values from the unique identifier column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_identifier: Option<String>,
}

//------------------------------------------------------------------------------
// ENRICHMENT
//------------------------------------------------------------------------------

/// External enrichment backends. Selection is a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "clearbit")]
    Clearbit,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "claude", alias = "anthropic")]
    Claude,
    #[serde(rename = "cloudflare")]
    Cloudflare,
    #[serde(rename = "perplexica")]
    Perplexica,
    #[serde(rename = "local-llm", alias = "local")]
    LocalLlm,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Clearbit => "clearbit",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Cloudflare => "cloudflare",
            ProviderKind::Perplexica => "perplexica",
            ProviderKind::LocalLlm => "local-llm",
        }
    }

    /// Whether the provider can answer free-form prompts (LLM backed).
    pub fn is_llm(&self) -> bool {
        !matches!(self, ProviderKind::Clearbit)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the enrichment subject column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// Email address, URL or hostname; a domain is extracted from it
    #[default]
    Domain,
    /// Company name used verbatim (trimmed, lowercased) as the lookup key
    Company,
}

impl EnrichmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentMode::Domain => "domain",
            EnrichmentMode::Company => "company",
        }
    }
}

/// Descriptive fields a provider can be asked for.
///
/// Declaration order is the canonical order used for cache keys, prompts and
/// export columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentField {
    Industry,
    Vertical,
    Employees,
    Hq,
    HqCountry,
    Description,
    ShortDescription,
    Founded,
    FoundedCountry,
    Revenue,
    Funding,
    FundingType,
    FundingStage,
    BusinessType,
    RevenueModel,
    CompanyStage,
    TickerSymbol,
}

impl EnrichmentField {
    pub const ALL: [EnrichmentField; 17] = [
        EnrichmentField::Industry,
        EnrichmentField::Vertical,
        EnrichmentField::Employees,
        EnrichmentField::Hq,
        EnrichmentField::HqCountry,
        EnrichmentField::Description,
        EnrichmentField::ShortDescription,
        EnrichmentField::Founded,
        EnrichmentField::FoundedCountry,
        EnrichmentField::Revenue,
        EnrichmentField::Funding,
        EnrichmentField::FundingType,
        EnrichmentField::FundingStage,
        EnrichmentField::BusinessType,
        EnrichmentField::RevenueModel,
        EnrichmentField::CompanyStage,
        EnrichmentField::TickerSymbol,
    ];

    /// Option key, as the host sends it (`hq_country`).
    pub fn key(&self) -> &'static str {
        match self {
            EnrichmentField::Industry => "industry",
            EnrichmentField::Vertical => "vertical",
            EnrichmentField::Employees => "employees",
            EnrichmentField::Hq => "hq",
            EnrichmentField::HqCountry => "hq_country",
            EnrichmentField::Description => "description",
            EnrichmentField::ShortDescription => "short_description",
            EnrichmentField::Founded => "founded",
            EnrichmentField::FoundedCountry => "founded_country",
            EnrichmentField::Revenue => "revenue",
            EnrichmentField::Funding => "funding",
            EnrichmentField::FundingType => "funding_type",
            EnrichmentField::FundingStage => "funding_stage",
            EnrichmentField::BusinessType => "business_type",
            EnrichmentField::RevenueModel => "revenue_model",
            EnrichmentField::CompanyStage => "company_stage",
            EnrichmentField::TickerSymbol => "ticker_symbol",
        }
    }

    /// JSON key in provider responses and serialized results (`hqCountry`).
    pub fn json_key(&self) -> &'static str {
        match self {
            EnrichmentField::Industry => "industry",
            EnrichmentField::Vertical => "vertical",
            EnrichmentField::Employees => "employeeCount",
            EnrichmentField::Hq => "headquarters",
            EnrichmentField::HqCountry => "hqCountry",
            EnrichmentField::Description => "description",
            EnrichmentField::ShortDescription => "shortDescription",
            EnrichmentField::Founded => "founded",
            EnrichmentField::FoundedCountry => "foundedCountry",
            EnrichmentField::Revenue => "revenue",
            EnrichmentField::Funding => "funding",
            EnrichmentField::FundingType => "fundingType",
            EnrichmentField::FundingStage => "fundingStage",
            EnrichmentField::BusinessType => "businessType",
            EnrichmentField::RevenueModel => "revenueModel",
            EnrichmentField::CompanyStage => "companyStage",
            EnrichmentField::TickerSymbol => "tickerSymbol",
        }
    }

    /// Column suffix used for augmented rows and exports (`HQ_COUNTRY`).
    pub fn column_suffix(&self) -> &'static str {
        match self {
            EnrichmentField::Industry => "INDUSTRY",
            EnrichmentField::Vertical => "VERTICAL",
            EnrichmentField::Employees => "EMPLOYEE_COUNT",
            EnrichmentField::Hq => "HEADQUARTERS",
            EnrichmentField::HqCountry => "HQ_COUNTRY",
            EnrichmentField::Description => "DESCRIPTION",
            EnrichmentField::ShortDescription => "SHORT_DESCRIPTION",
            EnrichmentField::Founded => "FOUNDED",
            EnrichmentField::FoundedCountry => "FOUNDED_COUNTRY",
            EnrichmentField::Revenue => "REVENUE",
            EnrichmentField::Funding => "FUNDING",
            EnrichmentField::FundingType => "FUNDING_TYPE",
            EnrichmentField::FundingStage => "FUNDING_STAGE",
            EnrichmentField::BusinessType => "BUSINESS_TYPE",
            EnrichmentField::RevenueModel => "REVENUE_MODEL",
            EnrichmentField::CompanyStage => "COMPANY_STAGE",
            EnrichmentField::TickerSymbol => "TICKER_SYMBOL",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

/// Descriptive company metadata. Every field is optional; providers fill what
/// they were asked for and know about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hq_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founded_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_symbol: Option<String>,
}

impl CompanyProfile {
    fn slot(&mut self, field: EnrichmentField) -> &mut Option<String> {
        match field {
            EnrichmentField::Industry => &mut self.industry,
            EnrichmentField::Vertical => &mut self.vertical,
            EnrichmentField::Employees => &mut self.employee_count,
            EnrichmentField::Hq => &mut self.headquarters,
            EnrichmentField::HqCountry => &mut self.hq_country,
            EnrichmentField::Description => &mut self.description,
            EnrichmentField::ShortDescription => &mut self.short_description,
            EnrichmentField::Founded => &mut self.founded,
            EnrichmentField::FoundedCountry => &mut self.founded_country,
            EnrichmentField::Revenue => &mut self.revenue,
            EnrichmentField::Funding => &mut self.funding,
            EnrichmentField::FundingType => &mut self.funding_type,
            EnrichmentField::FundingStage => &mut self.funding_stage,
            EnrichmentField::BusinessType => &mut self.business_type,
            EnrichmentField::RevenueModel => &mut self.revenue_model,
            EnrichmentField::CompanyStage => &mut self.company_stage,
            EnrichmentField::TickerSymbol => &mut self.ticker_symbol,
        }
    }

    pub fn get(&self, field: EnrichmentField) -> Option<&str> {
        let value = match field {
            EnrichmentField::Industry => &self.industry,
            EnrichmentField::Vertical => &self.vertical,
            EnrichmentField::Employees => &self.employee_count,
            EnrichmentField::Hq => &self.headquarters,
            EnrichmentField::HqCountry => &self.hq_country,
            EnrichmentField::Description => &self.description,
            EnrichmentField::ShortDescription => &self.short_description,
            EnrichmentField::Founded => &self.founded,
            EnrichmentField::FoundedCountry => &self.founded_country,
            EnrichmentField::Revenue => &self.revenue,
            EnrichmentField::Funding => &self.funding,
            EnrichmentField::FundingType => &self.funding_type,
            EnrichmentField::FundingStage => &self.funding_stage,
            EnrichmentField::BusinessType => &self.business_type,
            EnrichmentField::RevenueModel => &self.revenue_model,
            EnrichmentField::CompanyStage => &self.company_stage,
            EnrichmentField::TickerSymbol => &self.ticker_symbol,
        };
        value.as_deref()
    }

    /// Sets a field; blank values clear it.
    pub fn set(&mut self, field: EnrichmentField, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        *self.slot(field) = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Populated fields in canonical order.
    pub fn populated(&self) -> impl Iterator<Item = (EnrichmentField, &str)> {
        EnrichmentField::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|v| (f, v)))
    }
}

/// Outcome of enriching one row. Never mutated after the orchestrator builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    /// Raw subject value from the row
    pub domain: String,
    /// Lookup key: normalized domain, or lowercased company name
    pub normalized_domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(flatten)]
    pub profile: CompanyProfile,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
}

impl EnrichmentResult {
    pub fn failure(
        domain: impl Into<String>,
        normalized_domain: impl Into<String>,
        provider: ProviderKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            normalized_domain: normalized_domain.into(),
            company_name: None,
            profile: CompanyProfile::default(),
            success: false,
            error: Some(error.into()),
            provider,
            from_cache: None,
        }
    }

    pub fn is_from_cache(&self) -> bool {
        self.from_cache.unwrap_or(false)
    }
}

/// Persisted form of a successful enrichment.
///
/// `accessed_at` and `access_count` are bookkeeping for observability only;
/// nothing is evicted based on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEnrichment {
    pub cache_key: String,
    /// Normalized domain, or lowercased company name
    pub domain: String,
    pub provider: ProviderKind,
    pub enrichment_type: String,
    pub company_name: Option<String>,
    pub profile: CompanyProfile,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: i64,
}

impl CachedEnrichment {
    pub fn from_result(
        cache_key: impl Into<String>,
        enrichment_type: impl Into<String>,
        result: &EnrichmentResult,
    ) -> Self {
        let now = Utc::now();
        Self {
            cache_key: cache_key.into(),
            domain: result.normalized_domain.clone(),
            provider: result.provider,
            enrichment_type: enrichment_type.into(),
            company_name: result.company_name.clone(),
            profile: result.profile.clone(),
            success: result.success,
            error_message: result.error.clone(),
            created_at: now,
            accessed_at: now,
            access_count: 1,
        }
    }

    /// Rebuilds a row result, tagged as served from cache.
    pub fn to_result(&self, raw_domain: &str) -> EnrichmentResult {
        EnrichmentResult {
            domain: raw_domain.to_string(),
            normalized_domain: self.domain.clone(),
            company_name: self.company_name.clone(),
            profile: self.profile.clone(),
            success: self.success,
            error: self.error_message.clone(),
            provider: self.provider,
            from_cache: Some(true),
        }
    }
}
