//! Scheduling-service collaborator
//!
//! The sync engine talks to the external scheduler only through
//! [`SchedulerClient`]. [`HttpSchedulerClient`] speaks the REST API,
//! [`MemoryScheduler`] backs tests and offline runs.

pub mod http;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use http::HttpSchedulerClient;
pub use memory::MemoryScheduler;
pub use types::*;

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Creates a task and returns the id the service assigned to it.
    async fn create_task(&self, payload: &ExternalTask) -> Result<String, RemoteError>;

    async fn update_task(&self, remote_id: &str, payload: &ExternalTask) -> Result<(), RemoteError>;

    async fn list_tasks(&self) -> Result<Vec<ExternalTask>, RemoteError>;

    /// Looks up the record mirroring a vault task id.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<ExternalTask>, RemoteError>;

    /// Tasks modified after `since`.
    async fn list_modified_since(&self, since: DateTime<Utc>) -> Result<Vec<ExternalTask>, RemoteError> {
        Ok(self
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| t.modified_at() > since)
            .collect())
    }

    async fn delete_task(&self, remote_id: &str) -> Result<(), RemoteError>;

    /// Cheap reachability probe; never errors.
    async fn test_connection(&self) -> bool;

    /// Checks that required settings are present before any request.
    fn validate(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    fn client_name(&self) -> &str;
}
