//! Conflict-aware bidirectional synchronization
//!
//! One run of [`SynchronizationEngine::synchronize`]:
//! 1. rejects the call if another run is active
//! 2. detects changes newer than the checkpoint on each side
//! 3. groups them by task id and resolves conflicting groups by strategy
//! 4. applies each winner to the side it did not come from
//! 5. retries failed applies once, then advances the checkpoint

use super::sinks::TaskSink;
use super::state::{StateStore, SyncCheckpoint};
use super::{
    ApplyError, ConflictStrategy, SyncConfig, SyncError, SyncSide, SyncStatus, TaskChange,
};
use crate::compose::fields_from_external;
use crate::remote::ExternalTask;
use crate::task::{CanonicalTask, TaskLocation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Clears the running flag on every exit path.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Result<Self, SyncError> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyInProgress)?;
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct SynchronizationEngine {
    config: SyncConfig,
    vault_sink: Arc<dyn TaskSink>,
    remote_sink: Arc<dyn TaskSink>,
    checkpoint: Mutex<SyncCheckpoint>,
    state_store: Option<Arc<dyn StateStore>>,
    running: AtomicBool,
}

impl SynchronizationEngine {
    pub fn new(
        config: SyncConfig,
        vault_sink: Arc<dyn TaskSink>,
        remote_sink: Arc<dyn TaskSink>,
    ) -> Self {
        Self {
            config,
            vault_sink,
            remote_sink,
            checkpoint: Mutex::new(SyncCheckpoint::default()),
            state_store: None,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: SyncCheckpoint) -> Self {
        self.checkpoint = Mutex::new(checkpoint);
        self
    }

    /// Persists the checkpoint through `store` at the end of every run.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Replaces the in-memory checkpoint with the persisted one.
    pub async fn restore_checkpoint(&self) -> Result<SyncCheckpoint, SyncError> {
        let Some(store) = &self.state_store else {
            return Ok(self.checkpoint().await);
        };
        let checkpoint = store.load().await?.checkpoint;
        *self.checkpoint.lock().await = checkpoint.clone();
        Ok(checkpoint)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn checkpoint(&self) -> SyncCheckpoint {
        self.checkpoint.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn sink_for(&self, side: SyncSide) -> &Arc<dyn TaskSink> {
        match side {
            SyncSide::Vault => &self.vault_sink,
            SyncSide::Remote => &self.remote_sink,
        }
    }

    /// Reconciles vault tasks with scheduler tasks.
    ///
    /// Only [`SyncError::AlreadyInProgress`] and [`SyncError::Validation`] are
    /// returned as errors; item-level failures end up in the status.
    pub async fn synchronize(
        &self,
        vault_tasks: &[CanonicalTask],
        remote_tasks: &[ExternalTask],
    ) -> Result<SyncStatus, SyncError> {
        let _guard = RunGuard::acquire(&self.running)?;

        for side in [SyncSide::Vault, SyncSide::Remote] {
            if self.config.direction.writes_to(side) {
                self.sink_for(side)
                    .validate()
                    .map_err(|e| SyncError::Validation(e.to_string()))?;
            }
        }

        let since = self.checkpoint.lock().await.last_sync_time;
        let run_started = Utc::now();
        info!("Starting sync of changes since {}", since);

        let mut changes = Vec::new();
        if self.config.direction.writes_to(SyncSide::Remote) {
            changes.extend(detect_vault_changes(vault_tasks, since, run_started));
        }
        if self.config.direction.writes_to(SyncSide::Vault) {
            changes.extend(detect_remote_changes(remote_tasks, since, &self.config));
        }

        let groups = group_by_task(changes);
        let mut conflicts_resolved = 0;
        let mut winners = Vec::with_capacity(groups.len());
        for group in groups {
            if group.len() > 1 {
                conflicts_resolved += 1;
            }
            if let Some(winner) = resolve(group, self.config.conflict_strategy) {
                winners.push(winner);
            }
        }

        let mut applied = Vec::new();
        let mut retry = Vec::new();
        for change in winners {
            match self.apply(&change).await {
                Ok(()) => applied.push(change),
                Err(e) => {
                    warn!("Applying {} to {} failed, will retry: {}", change.task_id, change.source.opposite(), e);
                    retry.push(change);
                }
            }
        }

        let mut errors = Vec::new();
        for change in retry {
            match self.apply(&change).await {
                Ok(()) => applied.push(change),
                Err(e) => {
                    warn!("Retry of {} failed: {}", change.task_id, e);
                    errors.push(format!("{}: {}", change.task_id, e));
                }
            }
        }

        let last_sync_time = Utc::now();
        let mut status = SyncStatus {
            last_sync_time,
            tasks_synced: applied.len(),
            conflicts_resolved,
            last_error: errors.last().cloned(),
            errors,
            applied,
        };

        let checkpoint = {
            let mut checkpoint = self.checkpoint.lock().await;
            checkpoint.last_sync_time = last_sync_time;
            checkpoint.tasks_synced += status.tasks_synced as u64;
            checkpoint.conflicts_resolved += status.conflicts_resolved as u64;
            checkpoint.last_error = status.last_error.clone();
            checkpoint.clone()
        };
        if let Some(store) = &self.state_store
            && let Err(e) = store.save_checkpoint(&checkpoint).await
        {
            warn!("Failed to persist sync checkpoint: {}", e);
            let message = format!("checkpoint: {}", e);
            status.errors.push(message.clone());
            status.last_error = Some(message);
        }

        info!("{}", status.summary());
        Ok(status)
    }

    async fn apply(&self, change: &TaskChange) -> Result<(), ApplyError> {
        let sink = self.sink_for(change.source.opposite());
        sink.apply(change).await
    }
}

fn detect_vault_changes(
    tasks: &[CanonicalTask],
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<TaskChange> {
    tasks
        .iter()
        .filter_map(|task| {
            let timestamp = task.last_modified.unwrap_or(now);
            (timestamp > since).then(|| TaskChange {
                task_id: task.id.clone(),
                timestamp,
                source: SyncSide::Vault,
                fields: task.fields(),
                location: Some(task.location()),
                remote_id: None,
            })
        })
        .collect()
}

fn detect_remote_changes(
    tasks: &[ExternalTask],
    since: DateTime<Utc>,
    config: &SyncConfig,
) -> Vec<TaskChange> {
    tasks
        .iter()
        .filter_map(|task| {
            let Some(task_id) = task.sync_key() else {
                debug!("Ignoring scheduler task without id: {:?}", task.title);
                return None;
            };
            let timestamp = task.modified_at();
            (timestamp > since).then(|| TaskChange {
                task_id: task_id.to_string(),
                timestamp,
                source: SyncSide::Remote,
                fields: fields_from_external(task, &config.priority_from_remote),
                location: task.external_id.as_deref().and_then(TaskLocation::parse_id),
                remote_id: task.id.clone(),
            })
        })
        .collect()
}

/// Groups changes by task id, keeping first-seen order of ids and members.
fn group_by_task(changes: Vec<TaskChange>) -> Vec<Vec<TaskChange>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<TaskChange>> = Vec::new();
    for change in changes {
        match index.get(&change.task_id) {
            Some(&i) => groups[i].push(change),
            None => {
                index.insert(change.task_id.clone(), groups.len());
                groups.push(vec![change]);
            }
        }
    }
    groups
}

/// Picks exactly one change from a group.
fn resolve(group: Vec<TaskChange>, strategy: ConflictStrategy) -> Option<TaskChange> {
    if group.len() <= 1 {
        return group.into_iter().next();
    }

    let preferred = |side: SyncSide, group: Vec<TaskChange>| {
        let position = group.iter().position(|c| c.source == side).unwrap_or(0);
        group.into_iter().nth(position)
    };

    match strategy {
        ConflictStrategy::VaultWins => preferred(SyncSide::Vault, group),
        ConflictStrategy::RemoteWins => preferred(SyncSide::Remote, group),
        ConflictStrategy::MostRecent => most_recent(group),
        ConflictStrategy::Manual => {
            warn!(
                "Manual conflict resolution is not available, using most recent change for {}",
                group[0].task_id
            );
            most_recent(group)
        }
    }
}

/// Latest timestamp wins; ties go to the first change encountered.
fn most_recent(group: Vec<TaskChange>) -> Option<TaskChange> {
    group.into_iter().reduce(|best, candidate| {
        if candidate.timestamp > best.timestamp {
            candidate
        } else {
            best
        }
    })
}
