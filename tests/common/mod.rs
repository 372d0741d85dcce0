// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crm_cleaner_lib::enrichment::providers::{
    EnrichmentProvider, EnrichmentRequest, ProviderError, ProviderResponse,
};
use crm_cleaner_lib::enrichment::store::{CacheStore, InMemoryCacheStore};
use crm_cleaner_lib::models::{CachedEnrichment, CompanyProfile, EnrichmentField, ProviderKind, Row};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().copied().collect()
}

/// Provider that answers from the subject and records every call.
pub struct FakeProvider {
    kind: ProviderKind,
    failing: HashSet<String>,
    calls: AtomicUsize,
    subjects: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            subjects: Mutex::new(Vec::new()),
        }
    }

    /// Subjects for which the provider returns a transport error.
    pub fn failing_on(mut self, subjects: &[&str]) -> Self {
        self.failing = subjects.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnrichmentProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().unwrap().push(request.subject.clone());
        if self.failing.contains(&request.subject) {
            return Err(ProviderError::Transport(format!("connection reset for {}", request.subject)));
        }
        let mut profile = CompanyProfile::default();
        for field in &request.fields {
            profile.set(*field, format!("{} of {}", field.key(), request.subject));
        }
        let base = request.subject.split('.').next().unwrap_or_default();
        Ok(ProviderResponse {
            company_name: Some(format!("{} Corp", base)),
            profile,
        })
    }
}

/// In-memory store that counts how often each operation is used.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryCacheStore,
    pub gets: AtomicUsize,
    pub batch_gets: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, cache_key: &str) -> Result<Option<CachedEnrichment>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(cache_key).await
    }

    async fn get_many(&self, cache_keys: &[String]) -> Result<Vec<CachedEnrichment>> {
        self.batch_gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(cache_keys).await
    }

    async fn upsert(&self, entry: &CachedEnrichment) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(entry).await
    }

    async fn touch(&self, cache_key: &str, accessed_at: DateTime<Utc>) -> Result<()> {
        self.inner.touch(cache_key, accessed_at).await
    }

    async fn delete_all(&self) -> Result<u64> {
        self.inner.delete_all().await
    }
}

/// Store whose every call fails, as if the database were down.
pub struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _cache_key: &str) -> Result<Option<CachedEnrichment>> {
        anyhow::bail!("database unavailable")
    }

    async fn get_many(&self, _cache_keys: &[String]) -> Result<Vec<CachedEnrichment>> {
        anyhow::bail!("database unavailable")
    }

    async fn upsert(&self, _entry: &CachedEnrichment) -> Result<()> {
        anyhow::bail!("database unavailable")
    }

    async fn touch(&self, _cache_key: &str, _accessed_at: DateTime<Utc>) -> Result<()> {
        anyhow::bail!("database unavailable")
    }

    async fn delete_all(&self) -> Result<u64> {
        anyhow::bail!("database unavailable")
    }
}

pub const DEFAULT_FIELDS: [EnrichmentField; 2] = [EnrichmentField::Industry, EnrichmentField::Revenue];
