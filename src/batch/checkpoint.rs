//! Batch-run checkpoint state and its persistence seam.
//!
//! The checkpoint is the only state shared across parallel workers; stores
//! serialize writes internally so concurrent commits cannot lose updates.
//! The filesystem store writes through a temp file and rename so a crash
//! never leaves a half-written checkpoint behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

use crate::errors::PipelineError;
use crate::types::EntityId;

/// Terminal failure recorded for one entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub error: String,
    pub attempts: u32,
}

/// Persisted batch-run state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub processed_ids: BTreeSet<String>,
    pub failed_ids: BTreeMap<String, FailedEntry>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn new() -> Self {
        Self {
            processed_ids: BTreeSet::new(),
            failed_ids: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_processed(&self, entity_id: &EntityId) -> bool {
        self.processed_ids.contains(entity_id.as_str())
    }

    /// Commit a success. Clears any failure recorded by an earlier run.
    pub fn mark_processed(&mut self, entity_id: &EntityId) {
        self.processed_ids.insert(entity_id.to_string());
        self.failed_ids.remove(entity_id.as_str());
        self.updated_at = Utc::now();
    }

    /// Commit a terminal failure.
    pub fn mark_failed(&mut self, entity_id: &EntityId, error: impl Into<String>, attempts: u32) {
        self.failed_ids.insert(
            entity_id.to_string(),
            FailedEntry {
                error: error.into(),
                attempts,
            },
        );
        self.updated_at = Utc::now();
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence seam for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `Ok(None)` when no checkpoint exists yet. An unreadable checkpoint is
    /// [`PipelineError::CheckpointCorrupt`], never an empty state.
    async fn load(&self) -> Result<Option<Checkpoint>, PipelineError>;

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), PipelineError>;
}

/// In-process store for tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCheckpointStore {
    state: Arc<Mutex<Option<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, PipelineError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), PipelineError> {
        *self.state.lock().await = Some(checkpoint.clone());
        Ok(())
    }
}

/// JSON file store with atomic replace.
#[derive(Clone, Debug)]
pub struct FsCheckpointStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FsCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, PipelineError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).await?;
        let checkpoint =
            serde_json::from_str(&raw).map_err(|err| PipelineError::CheckpointCorrupt {
                path: self.path.display().to_string(),
                reason: err.to_string(),
            })?;
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), PipelineError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let serialized = serde_json::to_string_pretty(checkpoint)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
