//! Apply targets for resolved changes.

use super::{ApplyError, SyncSide, TaskChange};
use crate::compose::{PriorityMap, payload_from_fields};
use crate::remote::SchedulerClient;
use crate::task::{TaskFilter, TaskMetadata, TaskPatch, ensure_marker, render_content};
use crate::vault::TaskCollector;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes changes originating on the other side into one side.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// The side this sink writes to.
    fn side(&self) -> SyncSide;

    /// Checks required settings before a run starts.
    fn validate(&self) -> Result<(), ApplyError> {
        Ok(())
    }

    async fn apply(&self, change: &TaskChange) -> Result<(), ApplyError>;
}

/// Writes scheduler changes into vault files.
///
/// A change that points at a vault line rewrites that line in place. A change
/// without a vault location is appended to the inbox file, and the scheduler
/// record is linked to its new line when a linking client is configured.
pub struct VaultSink {
    collector: Arc<TaskCollector>,
    inbox_file: String,
    linker: Option<(Arc<dyn SchedulerClient>, PriorityMap)>,
}

impl VaultSink {
    pub fn new(collector: Arc<TaskCollector>, inbox_file: impl Into<String>) -> Self {
        Self {
            collector,
            inbox_file: inbox_file.into(),
            linker: None,
        }
    }

    /// Updates the scheduler record's external id after an inbox append.
    pub fn with_linker(mut self, client: Arc<dyn SchedulerClient>, priorities: PriorityMap) -> Self {
        self.linker = Some((client, priorities));
        self
    }

    fn inbox_line(&self, change: &TaskChange) -> String {
        let fields = &change.fields;
        let metadata = TaskMetadata {
            priority: fields.priority.clone(),
            due_date: fields.due_date.clone(),
            scheduled_date: fields.scheduled_date.clone(),
            start_date: fields.start_date.clone(),
            tags: fields.tags.clone(),
            ..Default::default()
        };
        let filter: &TaskFilter = self.collector.filter();
        let content = render_content(&fields.description, &metadata);
        let content = ensure_marker(&content, &filter.required_tag_for_sync);
        ensure_marker(&content, &filter.global_task_filter)
    }
}

#[async_trait]
impl TaskSink for VaultSink {
    fn side(&self) -> SyncSide {
        SyncSide::Vault
    }

    fn validate(&self) -> Result<(), ApplyError> {
        if self.inbox_file.trim().is_empty() {
            return Err(ApplyError::Unsupported {
                task_id: String::new(),
                reason: "no inbox file configured".to_string(),
            });
        }
        Ok(())
    }

    async fn apply(&self, change: &TaskChange) -> Result<(), ApplyError> {
        if let Some(location) = &change.location {
            let current = self.collector.read_fields_at(location).await?;
            let patch = TaskPatch::diff(&current, &change.fields);
            if patch.is_empty() {
                debug!("{} already matches the scheduler", location);
                return Ok(());
            }
            self.collector.update_at(location, &patch).await?;
            info!("Updated vault task {} from scheduler", location);
            return Ok(());
        }

        if change.fields.description.is_empty() {
            return Err(ApplyError::Unsupported {
                task_id: change.task_id.clone(),
                reason: "scheduler task has no title".to_string(),
            });
        }
        if change.fields.completed {
            debug!("Not importing completed scheduler task {}", change.task_id);
            return Ok(());
        }

        let location = self
            .collector
            .append_task(&self.inbox_file, &self.inbox_line(change))
            .await?;
        info!("Imported scheduler task {} to {}", change.task_id, location);

        if let (Some((client, priorities)), Some(remote_id)) = (&self.linker, &change.remote_id) {
            let payload = payload_from_fields(&location.id(), Some(&location), &change.fields, priorities);
            if let Err(e) = client.update_task(remote_id, &payload).await {
                warn!("Could not link scheduler task {} to {}: {}", remote_id, location, e);
            }
        }
        Ok(())
    }
}

/// Writes vault changes to the scheduler, creating records on first sight.
pub struct RemoteSink {
    client: Arc<dyn SchedulerClient>,
    priorities: PriorityMap,
}

impl RemoteSink {
    pub fn new(client: Arc<dyn SchedulerClient>, priorities: PriorityMap) -> Self {
        Self { client, priorities }
    }
}

#[async_trait]
impl TaskSink for RemoteSink {
    fn side(&self) -> SyncSide {
        SyncSide::Remote
    }

    fn validate(&self) -> Result<(), ApplyError> {
        self.client.validate().map_err(ApplyError::from)
    }

    async fn apply(&self, change: &TaskChange) -> Result<(), ApplyError> {
        let payload = payload_from_fields(
            &change.task_id,
            change.location.as_ref(),
            &change.fields,
            &self.priorities,
        );

        let existing = self.client.find_by_external_id(&change.task_id).await?;
        match existing.and_then(|task| task.id) {
            Some(remote_id) => {
                self.client.update_task(&remote_id, &payload).await?;
                debug!("Updated scheduler task {} for {}", remote_id, change.task_id);
            }
            None => {
                let remote_id = self.client.create_task(&payload).await?;
                debug!("Created scheduler task {} for {}", remote_id, change.task_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryScheduler;
    use crate::task::{TaskFields, TaskLocation};
    use crate::vault::MemoryVault;
    use chrono::Utc;

    fn change(task_id: &str, source: SyncSide, fields: TaskFields) -> TaskChange {
        TaskChange {
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
            source,
            location: TaskLocation::parse_id(task_id),
            remote_id: None,
            fields,
        }
    }

    #[tokio::test]
    async fn test_remote_sink_creates_then_updates() {
        let scheduler = Arc::new(MemoryScheduler::new());
        let sink = RemoteSink::new(scheduler.clone(), PriorityMap::vault_to_remote());
        let mut fields = TaskFields {
            description: "Write proposal".to_string(),
            ..Default::default()
        };

        sink.apply(&change("Work.md:3", SyncSide::Vault, fields.clone()))
            .await
            .unwrap();
        fields.completed = true;
        sink.apply(&change("Work.md:3", SyncSide::Vault, fields))
            .await
            .unwrap();

        let tasks = scheduler.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_completed());
        assert_eq!(tasks[0].description.as_deref(), Some("From vault: Work.md:3"));
    }

    #[tokio::test]
    async fn test_vault_sink_completion_touches_status_only() {
        let vault = Arc::new(MemoryVault::new());
        vault
            .insert("Work.md", "# Work\n- [ ] Write   proposal (A) #work\n", None)
            .await;
        let collector = Arc::new(TaskCollector::new(vault.clone(), TaskFilter::default(), &[]));
        let sink = VaultSink::new(collector, "Tasks.md");

        let fields = TaskFields {
            description: "Write proposal".to_string(),
            completed: true,
            priority: Some("A".to_string()),
            tags: vec!["work".to_string()],
            ..Default::default()
        };
        sink.apply(&change("Work.md:2", SyncSide::Remote, fields))
            .await
            .unwrap();

        assert_eq!(
            vault.content("Work.md").await.unwrap(),
            "# Work\n- [x] Write   proposal (A) #work\n"
        );
    }

    #[tokio::test]
    async fn test_vault_sink_appends_and_links_new_remote_task() {
        let vault = Arc::new(MemoryVault::new());
        let scheduler = Arc::new(MemoryScheduler::new());
        let remote_id = scheduler
            .insert(crate::remote::ExternalTask {
                title: "Book dentist".to_string(),
                ..Default::default()
            })
            .await;

        let filter = TaskFilter {
            global_task_filter: "#task".to_string(),
            ..Default::default()
        };
        let collector = Arc::new(TaskCollector::new(vault.clone(), filter, &[]));
        let sink = VaultSink::new(collector, "Tasks.md")
            .with_linker(scheduler.clone(), PriorityMap::vault_to_remote());

        let mut new_task = change(
            &remote_id,
            SyncSide::Remote,
            TaskFields {
                description: "Book dentist".to_string(),
                due_date: Some("2025-05-02".to_string()),
                ..Default::default()
            },
        );
        new_task.remote_id = Some(remote_id.clone());
        sink.apply(&new_task).await.unwrap();

        assert_eq!(
            vault.content("Tasks.md").await.unwrap(),
            "- [ ] #task Book dentist 📅 2025-05-02\n"
        );
        let linked = scheduler.get(&remote_id).await.unwrap();
        assert_eq!(linked.external_id.as_deref(), Some("Tasks.md:1"));
    }
}
