use super::{ExternalTask, RemoteError, SchedulerClient};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// In-process scheduler used by tests and dry runs.
///
/// Writes can be made to fail a fixed number of times to exercise retries.
#[derive(Default)]
pub struct MemoryScheduler {
    tasks: Mutex<BTreeMap<String, ExternalTask>>,
    next_id: AtomicUsize,
    failures_left: AtomicUsize,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a task as-is, assigning an id when it has none.
    pub async fn insert(&self, mut task: ExternalTask) -> String {
        let id = task.id.clone().unwrap_or_else(|| self.allocate_id());
        task.id = Some(id.clone());
        self.tasks.lock().await.insert(id.clone(), task);
        id
    }

    pub async fn tasks(&self) -> Vec<ExternalTask> {
        self.tasks.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, remote_id: &str) -> Option<ExternalTask> {
        self.tasks.lock().await.get(remote_id).cloned()
    }

    /// The next `count` create/update calls fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful create/update calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_write(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("scheduler offline".to_string()));
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RemoteError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulerClient for MemoryScheduler {
    async fn create_task(&self, payload: &ExternalTask) -> Result<String, RemoteError> {
        self.check_write()?;
        let id = self.allocate_id();
        let now = Utc::now().to_rfc3339();
        let mut task = payload.clone();
        task.id = Some(id.clone());
        task.created_time = Some(now.clone());
        task.updated_time = Some(now);
        self.tasks.lock().await.insert(id.clone(), task);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_task(&self, remote_id: &str, payload: &ExternalTask) -> Result<(), RemoteError> {
        self.check_write()?;
        let mut tasks = self.tasks.lock().await;
        let existing = tasks
            .get_mut(remote_id)
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))?;

        let created_time = existing.created_time.take();
        *existing = ExternalTask {
            id: Some(remote_id.to_string()),
            created_time,
            updated_time: Some(Utc::now().to_rfc3339()),
            ..payload.clone()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<ExternalTask>, RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("scheduler offline".to_string()));
        }
        Ok(self.tasks().await)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<ExternalTask>, RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("scheduler offline".to_string()));
        }
        Ok(self
            .tasks
            .lock()
            .await
            .values()
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn delete_task(&self, remote_id: &str) -> Result<(), RemoteError> {
        self.tasks
            .lock()
            .await
            .remove(remote_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))
    }

    async fn test_connection(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    fn client_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_update_lookup() {
        let scheduler = MemoryScheduler::new();
        let payload = ExternalTask {
            title: "One".to_string(),
            external_id: Some("a.md:1".to_string()),
            ..Default::default()
        };
        let id = scheduler.create_task(&payload).await.unwrap();

        let found = scheduler.find_by_external_id("a.md:1").await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some(id.as_str()));
        assert!(found.created_time.is_some());

        let renamed = ExternalTask {
            title: "Renamed".to_string(),
            ..payload
        };
        scheduler.update_task(&id, &renamed).await.unwrap();
        let stored = scheduler.get(&id).await.unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.created_time, found.created_time);
        assert_eq!(scheduler.write_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let scheduler = MemoryScheduler::new();
        scheduler.fail_next_writes(1);
        let payload = ExternalTask::default();
        assert!(scheduler.create_task(&payload).await.is_err());
        assert!(scheduler.create_task(&payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let scheduler = MemoryScheduler::new();
        assert!(matches!(
            scheduler.update_task("nope", &ExternalTask::default()).await,
            Err(RemoteError::NotFound(_))
        ));
    }
}
