//! Injected enrichment cache.
//!
//! External classification metadata (sector, jurisdiction) is expensive to
//! fetch, so the aggregator consults an explicit cache seam instead of
//! ambient global state. Entries carry their write time and expire after the
//! store's declared TTL; an expired entry is a miss.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::PipelineError;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CachedEntry {
    value: serde_json::Value,
    cached_at: DateTime<Utc>,
}

impl CachedEntry {
    fn is_fresh(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        now - self.cached_at <= Duration::seconds(ttl_secs as i64)
    }
}

/// Key/value cache with a declared TTL. Expired entries read as misses.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PipelineError>;
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), PipelineError>;
}

/// In-process cache for tests and single-run pipelines.
#[derive(Clone, Debug)]
pub struct InMemoryMetadataCache {
    ttl_secs: u64,
    entries: Arc<Mutex<BTreeMap<String, CachedEntry>>>,
}

impl InMemoryMetadataCache {
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

#[async_trait]
impl MetadataCache for InMemoryMetadataCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PipelineError> {
        let guard = self.entries.lock().await;
        Ok(guard
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl_secs, Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), PipelineError> {
        let mut guard = self.entries.lock().await;
        guard.insert(
            key.to_string(),
            CachedEntry {
                value,
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }
}

/// Filesystem-backed cache persisting one JSON map of entries.
///
/// Loads lazily on first access and rewrites the whole file on put; entry
/// counts are small (one per entity) so this stays cheap.
#[derive(Clone, Debug)]
pub struct FsMetadataCache {
    path: PathBuf,
    ttl_secs: u64,
    entries: Arc<Mutex<Option<BTreeMap<String, CachedEntry>>>>,
}

impl FsMetadataCache {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            path: path.into(),
            ttl_secs,
            entries: Arc::new(Mutex::new(None)),
        }
    }

    async fn load_into(
        &self,
        slot: &mut Option<BTreeMap<String, CachedEntry>>,
    ) -> Result<(), PipelineError> {
        if slot.is_some() {
            return Ok(());
        }
        let entries = if self.path.exists() {
            let raw = fs::read_to_string(&self.path).await?;
            match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(err) => {
                    // A damaged cache only costs re-fetching enrichment.
                    debug!(path = %self.path.display(), error = %err, "discarding unreadable enrichment cache");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        *slot = Some(entries);
        Ok(())
    }

    async fn persist(&self, entries: &BTreeMap<String, CachedEntry>) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let serialized = serde_json::to_string(entries)?;
        fs::write(&self.path, serialized).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataCache for FsMetadataCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PipelineError> {
        let mut guard = self.entries.lock().await;
        self.load_into(&mut guard).await?;
        let entries = guard.as_ref().ok_or_else(|| {
            PipelineError::Config("enrichment cache failed to initialize".to_string())
        })?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl_secs, Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), PipelineError> {
        let mut guard = self.entries.lock().await;
        self.load_into(&mut guard).await?;
        let entries = guard.as_mut().ok_or_else(|| {
            PipelineError::Config("enrichment cache failed to initialize".to_string())
        })?;
        entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                cached_at: Utc::now(),
            },
        );
        self.persist(entries).await
    }
}
