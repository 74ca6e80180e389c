//! Persistence for the deduplicated build history.
//!
//! The history is a single JSON list, newest first, with `hash` as the
//! identity key. The hub never rewrites history — it only appends through
//! [`BuildStore::append_if_absent`], which is an idempotent upsert.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::record::BuildRecord;

/// Abstraction over the blob holding the build history.
///
/// Backed by a JSON file in production and an in-memory list in tests.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// The full stored history, newest first.
    async fn get_all(&self) -> Result<Vec<BuildRecord>, StoreError>;

    /// Insert the candidate unless a record with the same hash already
    /// exists. Returns the stored record either way (new or pre-existing).
    async fn append_if_absent(&self, candidate: BuildRecord) -> Result<BuildRecord, StoreError>;

    /// The most recent record: the head of the newest-first history.
    async fn get_latest(&self) -> Result<Option<BuildRecord>, StoreError> {
        Ok(self.get_all().await?.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests / ephemeral runs)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    builds: Mutex<Vec<BuildRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<BuildRecord>, StoreError> {
        Ok(self.builds.lock().await.clone())
    }

    async fn append_if_absent(&self, candidate: BuildRecord) -> Result<BuildRecord, StoreError> {
        let mut builds = self.builds.lock().await;
        if let Some(existing) = builds.iter().find(|b| b.hash == candidate.hash) {
            return Ok(existing.clone());
        }
        builds.insert(0, candidate.clone());
        Ok(candidate)
    }
}

// ---------------------------------------------------------------------------
// File-backed implementation
// ---------------------------------------------------------------------------

/// Stores the history as one JSON array on disk.
///
/// All access goes through an async mutex so the read-modify-write in
/// `append_if_absent` can't interleave between the admission path and a
/// poll tick.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_history(&self) -> Result<Vec<BuildRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            // A missing blob is an empty history, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_history(&self, builds: &[BuildRecord]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(builds)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl BuildStore for JsonFileStore {
    async fn get_all(&self) -> Result<Vec<BuildRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_history().await
    }

    async fn append_if_absent(&self, candidate: BuildRecord) -> Result<BuildRecord, StoreError> {
        let _guard = self.lock.lock().await;
        let mut builds = self.read_history().await?;
        if let Some(existing) = builds.iter().find(|b| b.hash == candidate.hash) {
            return Ok(existing.clone());
        }
        builds.insert(0, candidate.clone());
        self.write_history(&builds).await?;
        Ok(candidate)
    }
}
