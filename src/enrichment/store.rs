// src/enrichment/store.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio_postgres::Row as PgRow;

use crate::db::PgPool;
use crate::models::{CachedEnrichment, CompanyProfile, ProviderKind};

/// Persistent key/value boundary behind the enrichment cache.
///
/// Grow-only: entries are upserted and never evicted, only removed wholesale
/// by `delete_all`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, cache_key: &str) -> Result<Option<CachedEnrichment>>;

    /// One round trip for a batch of keys. Unknown keys are simply absent.
    async fn get_many(&self, cache_keys: &[String]) -> Result<Vec<CachedEnrichment>>;

    async fn upsert(&self, entry: &CachedEnrichment) -> Result<()>;

    /// Records an access: bumps `access_count` and sets `accessed_at`.
    async fn touch(&self, cache_key: &str, accessed_at: DateTime<Utc>) -> Result<()>;

    /// Removes every entry, returning how many were deleted.
    async fn delete_all(&self) -> Result<u64>;
}

/// Process-local store, for tests and hosts without a database.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CachedEnrichment>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CachedEnrichment>> {
        Ok(self.entries.lock().await.get(cache_key).cloned())
    }

    async fn get_many(&self, cache_keys: &[String]) -> Result<Vec<CachedEnrichment>> {
        let entries = self.entries.lock().await;
        Ok(cache_keys
            .iter()
            .filter_map(|k| entries.get(k).cloned())
            .collect())
    }

    async fn upsert(&self, entry: &CachedEnrichment) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(entry.cache_key.clone(), entry.clone());
        Ok(())
    }

    async fn touch(&self, cache_key: &str, accessed_at: DateTime<Utc>) -> Result<()> {
        if let Some(entry) = self.entries.lock().await.get_mut(cache_key) {
            entry.access_count += 1;
            entry.accessed_at = accessed_at;
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }
}

const SELECT_COLUMNS: &str = "cache_key, domain, provider, enrichment_type, company_name, profile, \
     success, error_message, created_at, accessed_at, access_count";

/// PostgreSQL-backed store over the `enrichment_cache` table.
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Decodes the `provider` column, which holds `ProviderKind::as_str()`.
    fn parse_provider(value: &str) -> Result<ProviderKind> {
        serde_json::from_value(serde_json::Value::String(value.to_string()))
            .map_err(|_| anyhow!("Unknown provider '{}' in enrichment_cache", value))
    }

    fn row_to_entry(row: &PgRow) -> Result<CachedEnrichment> {
        let provider_str: String = row.try_get("provider")?;
        let provider = Self::parse_provider(&provider_str)?;
        let profile_json: serde_json::Value = row.try_get("profile")?;
        let profile: CompanyProfile = serde_json::from_value(profile_json)
            .context("Failed to decode cached company profile")?;

        Ok(CachedEnrichment {
            cache_key: row.try_get("cache_key")?,
            domain: row.try_get("domain")?,
            provider,
            enrichment_type: row.try_get("enrichment_type")?,
            company_name: row.try_get("company_name")?,
            profile,
            success: row.try_get("success")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            accessed_at: row.try_get("accessed_at")?,
            access_count: row.try_get("access_count")?,
        })
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CachedEnrichment>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for cache lookup")?;
        let sql = format!("SELECT {} FROM enrichment_cache WHERE cache_key = $1", SELECT_COLUMNS);
        let row = conn
            .query_opt(sql.as_str(), &[&cache_key])
            .await
            .context(format!("Failed to query enrichment_cache for {}", cache_key))?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn get_many(&self, cache_keys: &[String]) -> Result<Vec<CachedEnrichment>> {
        if cache_keys.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for bulk cache lookup")?;
        let sql = format!(
            "SELECT {} FROM enrichment_cache WHERE cache_key = ANY($1)",
            SELECT_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&cache_keys])
            .await
            .context("Failed to bulk query enrichment_cache")?;
        debug!(
            "Bulk cache lookup: {} keys requested, {} found",
            cache_keys.len(),
            rows.len()
        );
        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn upsert(&self, entry: &CachedEnrichment) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for cache upsert")?;
        const UPSERT_SQL: &str = "
            INSERT INTO enrichment_cache (
                cache_key, domain, provider, enrichment_type, company_name, profile,
                success, error_message, created_at, accessed_at, access_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (cache_key) DO UPDATE SET
                company_name = EXCLUDED.company_name,
                profile = EXCLUDED.profile,
                success = EXCLUDED.success,
                error_message = EXCLUDED.error_message,
                accessed_at = EXCLUDED.accessed_at";
        let profile = serde_json::to_value(&entry.profile)
            .context("Failed to encode company profile")?;
        conn.execute(
            UPSERT_SQL,
            &[
                &entry.cache_key,
                &entry.domain,
                &entry.provider.as_str(),
                &entry.enrichment_type,
                &entry.company_name,
                &profile,
                &entry.success,
                &entry.error_message,
                &entry.created_at,
                &entry.accessed_at,
                &entry.access_count,
            ],
        )
        .await
        .context(format!("Failed to upsert enrichment_cache entry {}", entry.cache_key))?;
        Ok(())
    }

    async fn touch(&self, cache_key: &str, accessed_at: DateTime<Utc>) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for cache touch")?;
        conn.execute(
            "UPDATE enrichment_cache
             SET accessed_at = $2, access_count = access_count + 1
             WHERE cache_key = $1",
            &[&cache_key, &accessed_at],
        )
        .await
        .context(format!("Failed to update access stats for {}", cache_key))?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for cache purge")?;
        let removed = conn
            .execute("DELETE FROM enrichment_cache", &[])
            .await
            .context("Failed to purge enrichment_cache")?;
        info!("Purged {} rows from enrichment_cache", removed);
        Ok(removed)
    }
}
