//! Durable sync state: the engine checkpoint and the outbound synced-lines cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs as async_fs;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error accessing sync state '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Sync state is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Boundary of the last completed synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub last_sync_time: DateTime<Utc>,
    /// Cumulative across runs
    #[serde(default)]
    pub tasks_synced: u64,
    /// Cumulative across runs
    #[serde(default)]
    pub conflicts_resolved: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Default for SyncCheckpoint {
    fn default() -> Self {
        Self {
            last_sync_time: DateTime::<Utc>::UNIX_EPOCH,
            tasks_synced: 0,
            conflicts_resolved: 0,
            last_error: None,
        }
    }
}

/// Line indexes (0-based) already emailed, per vault file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncedLines(pub BTreeMap<String, BTreeSet<usize>>);

impl SyncedLines {
    pub fn contains(&self, path: &str, line: usize) -> bool {
        self.0.get(path).is_some_and(|lines| lines.contains(&line))
    }

    pub fn mark(&mut self, path: &str, line: usize) {
        self.0.entry(path.to_string()).or_default().insert(line);
    }

    pub fn lines(&self, path: &str) -> Vec<usize> {
        self.0
            .get(path)
            .map(|lines| lines.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub checkpoint: SyncCheckpoint,
    #[serde(default)]
    pub synced_lines: SyncedLines,
}

/// Scoped persistence for [`SyncState`].
///
/// Each half is saved independently so the engine and the outbound flow never
/// overwrite each other's data.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<SyncState, StateError>;

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), StateError>;

    async fn save_synced_lines(&self, lines: &SyncedLines) -> Result<(), StateError>;
}

/// JSON file store, written through a temp file and rename.
pub struct JsonStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read(&self) -> Result<SyncState, StateError> {
        match async_fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SyncState::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write(&self, state: &SyncState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let temp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        async_fs::write(&temp, bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        async_fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Saved sync state to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), StateError> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        state.checkpoint = checkpoint.clone();
        self.write(&state).await
    }

    async fn save_synced_lines(&self, lines: &SyncedLines) -> Result<(), StateError> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        state.synced_lines = lines.clone();
        self.write(&state).await
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<SyncState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn snapshot(&self) -> SyncState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        Ok(self.snapshot().await)
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), StateError> {
        self.state.lock().await.checkpoint = checkpoint.clone();
        Ok(())
    }

    async fn save_synced_lines(&self, lines: &SyncedLines) -> Result<(), StateError> {
        self.state.lock().await.synced_lines = lines.clone();
        Ok(())
    }
}
