// src/enrichment/cache.rs

use chrono::Utc;
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::CacheStore;
use crate::error::{CleanerError, Result};
use crate::models::{CachedEnrichment, ProviderKind};

/// Lookup coordinates for one cached enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheRequest {
    pub subject: String,
    pub provider: ProviderKind,
    pub enrichment_type: String,
}

impl CacheRequest {
    pub fn new(subject: impl Into<String>, provider: ProviderKind, enrichment_type: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            provider,
            enrichment_type: enrichment_type.into(),
        }
    }

    pub fn cache_key(&self) -> String {
        EnrichmentCache::generate_cache_key(&self.subject, self.provider, &self.enrichment_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Percentage, rounded to two decimals
    pub hit_rate: f64,
}

/// Two-tier enrichment cache: a process-lifetime memory map in front of an
/// optional persistent [`CacheStore`].
///
/// Store failures degrade to misses (reads) or memory-only writes; only
/// [`EnrichmentCache::clear_all`] reports them. There is no eviction.
pub struct EnrichmentCache {
    memory: Mutex<HashMap<String, CachedEnrichment>>,
    store: Option<Arc<dyn CacheStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EnrichmentCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: Some(store),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn memory_only() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// `"{subject}-{provider}-{type}"`, with the subject trimmed and lowercased.
    pub fn generate_cache_key(subject: &str, provider: ProviderKind, enrichment_type: &str) -> String {
        format!(
            "{}-{}-{}",
            subject.trim().to_lowercase(),
            provider.as_str(),
            enrichment_type
        )
    }

    pub async fn get(
        &self,
        subject: &str,
        provider: ProviderKind,
        enrichment_type: &str,
    ) -> Option<CachedEnrichment> {
        let key = Self::generate_cache_key(subject, provider, enrichment_type);

        if let Some(entry) = self.memory.lock().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("Memory cache hit for {}", key);
            return Some(entry.clone());
        }

        let found = match &self.store {
            Some(store) => match store.get(&key).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Cache store lookup failed for {}: {:#}", key, e);
                    None
                }
            },
            None => None,
        };

        match found {
            Some(mut entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Store cache hit for {}", key);
                self.record_access(&mut entry).await;
                self.memory.lock().await.insert(key, entry.clone());
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache miss for {}", key);
                None
            }
        }
    }

    /// Best-effort access bookkeeping on a store hit.
    async fn record_access(&self, entry: &mut CachedEnrichment) {
        let now = Utc::now();
        entry.access_count += 1;
        entry.accessed_at = now;
        if let Some(store) = &self.store {
            if let Err(e) = store.touch(&entry.cache_key, now).await {
                warn!("Failed to record cache access for {}: {:#}", entry.cache_key, e);
            }
        }
    }

    /// Write-through to memory and the store.
    pub async fn set(&self, entry: CachedEnrichment) {
        if let Some(store) = &self.store {
            if let Err(e) = store.upsert(&entry).await {
                warn!(
                    "Failed to persist cache entry {}: {:#}. Keeping it in memory only.",
                    entry.cache_key, e
                );
            }
        }
        self.memory.lock().await.insert(entry.cache_key.clone(), entry);
    }

    /// Batched lookup. Memory-resident keys are answered directly; the rest
    /// go to the store in a single query. Results are keyed by cache key.
    pub async fn bulk_get(&self, requests: &[CacheRequest]) -> HashMap<String, CachedEnrichment> {
        let mut found = HashMap::new();
        let mut pending = Vec::new();
        {
            let memory = self.memory.lock().await;
            for request in requests {
                let key = request.cache_key();
                if found.contains_key(&key) || pending.contains(&key) {
                    continue;
                }
                match memory.get(&key) {
                    Some(entry) => {
                        found.insert(key, entry.clone());
                    }
                    None => pending.push(key),
                }
            }
        }
        let memory_hits = found.len();

        if let (Some(store), false) = (&self.store, pending.is_empty()) {
            match store.get_many(&pending).await {
                Ok(entries) => {
                    let mut memory = self.memory.lock().await;
                    for entry in entries {
                        memory.insert(entry.cache_key.clone(), entry.clone());
                        found.insert(entry.cache_key.clone(), entry);
                    }
                }
                Err(e) => warn!("Bulk cache lookup failed: {:#}", e),
            }
        }

        let hits = found.len() as u64;
        let misses = (memory_hits + pending.len()) as u64 - hits;
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
        debug!(
            "Bulk cache lookup: {} unique keys, {} from memory, {} from store, {} missing",
            memory_hits + pending.len(),
            memory_hits,
            hits as usize - memory_hits,
            misses
        );
        found
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
        }
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Drops the memory tier only; the store keeps its entries.
    pub async fn clear_memory(&self) {
        let mut memory = self.memory.lock().await;
        let dropped = memory.len();
        memory.clear();
        info!("Cleared {} entries from memory cache", dropped);
    }

    /// Purges both tiers and resets the hit/miss counters. Irreversible.
    pub async fn clear_all(&self) -> Result<()> {
        self.memory.lock().await.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        if let Some(store) = &self.store {
            let removed = store
                .delete_all()
                .await
                .map_err(|e| CleanerError::Cache(format!("{:#}", e)))?;
            info!("Cleared enrichment cache: {} persisted entries removed", removed);
        } else {
            info!("Cleared enrichment cache (memory only)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::store::InMemoryCacheStore;
    use crate::models::EnrichmentResult;

    fn entry(subject: &str) -> CachedEnrichment {
        let key = EnrichmentCache::generate_cache_key(subject, ProviderKind::Claude, "domain:industry");
        let mut result = EnrichmentResult::failure(subject, subject, ProviderKind::Claude, "");
        result.success = true;
        result.error = None;
        result.company_name = Some("Acme".to_string());
        CachedEnrichment::from_result(key, "domain:industry", &result)
    }

    #[test]
    fn key_is_lowercased_and_trimmed() {
        assert_eq!(
            EnrichmentCache::generate_cache_key("  Acme.COM ", ProviderKind::OpenAi, "domain:industry"),
            "acme.com-openai-domain:industry"
        );
    }

    #[tokio::test]
    async fn store_hit_populates_memory_and_bumps_access() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.upsert(&entry("acme.com")).await.unwrap();
        let cache = EnrichmentCache::new(store.clone());

        let got = cache.get("acme.com", ProviderKind::Claude, "domain:industry").await.unwrap();
        assert_eq!(got.access_count, 2);
        assert_eq!(cache.memory_len().await, 1);
        let persisted = store.get(&got.cache_key).await.unwrap().unwrap();
        assert_eq!(persisted.access_count, 2);

        assert!(cache.get("other.com", ProviderKind::Claude, "domain:industry").await.is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate, 50.0);
    }

    #[tokio::test]
    async fn clear_memory_keeps_store() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = EnrichmentCache::new(store.clone());
        cache.set(entry("acme.com")).await;
        cache.clear_memory().await;
        assert_eq!(cache.memory_len().await, 0);
        assert!(cache.get("acme.com", ProviderKind::Claude, "domain:industry").await.is_some());
    }

    #[tokio::test]
    async fn memory_only_cache_works_without_store() {
        let cache = EnrichmentCache::memory_only();
        cache.set(entry("acme.com")).await;
        assert!(cache.get("ACME.com", ProviderKind::Claude, "domain:industry").await.is_some());
        cache.clear_all().await.unwrap();
        assert_eq!(cache.memory_len().await, 0);
        assert_eq!(cache.stats().hits, 0);
    }
}
