use crate::compose::PriorityMap;
use crate::remote::RemoteError;
use crate::task::{TaskFields, TaskLocation};
use crate::vault::VaultError;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::state::StateError;

/// One of the two independently mutable task collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSide {
    Vault,
    Remote,
}

impl SyncSide {
    pub fn opposite(self) -> Self {
        match self {
            SyncSide::Vault => SyncSide::Remote,
            SyncSide::Remote => SyncSide::Vault,
        }
    }
}

impl fmt::Display for SyncSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSide::Vault => write!(f, "vault"),
            SyncSide::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    VaultWins,
    RemoteWins,
    #[default]
    MostRecent,
    /// Not interactive: warns and resolves as [`ConflictStrategy::MostRecent`]
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    #[default]
    Bidirectional,
    ToRemote,
    FromRemote,
}

impl SyncDirection {
    /// Whether changes may be written to `target`.
    pub fn writes_to(self, target: SyncSide) -> bool {
        match (self, target) {
            (SyncDirection::Bidirectional, _) => true,
            (SyncDirection::ToRemote, SyncSide::Remote) => true,
            (SyncDirection::FromRemote, SyncSide::Vault) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    #[serde(default)]
    pub direction: SyncDirection,
    /// Seconds between runs of `vts watch`
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Quiet period before a modified file is processed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "PriorityMap::vault_to_remote")]
    pub priority_to_remote: PriorityMap,
    #[serde(default = "PriorityMap::remote_to_vault")]
    pub priority_from_remote: PriorityMap,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::default(),
            direction: SyncDirection::default(),
            interval_secs: default_interval_secs(),
            debounce_ms: default_debounce_ms(),
            priority_to_remote: PriorityMap::vault_to_remote(),
            priority_from_remote: PriorityMap::remote_to_vault(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// A task modified on one side since the last checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChange {
    /// Merge key shared by both sides
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: SyncSide,
    pub fields: TaskFields,
    /// Vault line the task lives on, when known
    pub location: Option<TaskLocation>,
    /// Scheduler record id, when the change came from the scheduler
    pub remote_id: Option<String>,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_sync_time: DateTime<Utc>,
    pub tasks_synced: usize,
    pub conflicts_resolved: usize,
    pub last_error: Option<String>,
    pub errors: Vec<String>,
    /// Winning changes that were applied successfully
    pub applied: Vec<TaskChange>,
}

impl SyncStatus {
    pub fn summary(&self) -> String {
        match &self.last_error {
            Some(error) => format!(
                "Synced {} tasks, resolved {} conflicts, {} errors (last: {})",
                self.tasks_synced,
                self.conflicts_resolved,
                self.errors.len(),
                error
            ),
            None => format!(
                "Synced {} tasks, resolved {} conflicts",
                self.tasks_synced, self.conflicts_resolved
            ),
        }
    }
}

/// Failure applying one change to one side.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Cannot apply change to {task_id}: {reason}")]
    Unsupported { task_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Synchronization already in progress")]
    AlreadyInProgress,

    #[error("Sync configuration invalid: {0}")]
    Validation(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    State(#[from] StateError),
}
