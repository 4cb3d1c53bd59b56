//! Checkpointed batch execution of the aggregate → embed → index pipeline.

pub mod checkpoint;
pub mod orchestrator;
pub mod retry;

pub use checkpoint::{Checkpoint, CheckpointStore, FailedEntry, FsCheckpointStore, InMemoryCheckpointStore};
pub use orchestrator::{BatchOrchestrator, BatchSummary, EntityOutcome, EntityResult};
pub use retry::retry_with_backoff;
