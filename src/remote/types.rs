use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.skedpal.com/v1";

/// Lifecycle states the scheduler reports for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

/// A task record as exchanged with the scheduling service.
///
/// The same shape is sent as the create/update payload (with `id` and the
/// timestamps left out) and received from list and lookup calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// RFC 3339 instant, e.g. `2025-03-30T00:00:00Z`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RemoteStatus>,
    /// Vault task id (`path:line`) this record mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<String>,
}

impl ExternalTask {
    /// Key used to pair this record with a vault task.
    pub fn sync_key(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.id.as_deref())
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(RemoteStatus::Completed)
    }

    /// Last modification instant: updated, else created, else now.
    pub fn modified_at(&self) -> DateTime<Utc> {
        [&self.updated_time, &self.created_time]
            .into_iter()
            .flatten()
            .find_map(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// Connection settings for the scheduling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            workspace_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credentials must be present before any request is made.
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.api_key.trim().is_empty() {
            return Err(RemoteError::Validation("API key is not configured".into()));
        }
        if self.workspace_id.trim().is_empty() {
            return Err(RemoteError::Validation(
                "workspace id is not configured".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Scheduler configuration invalid: {0}")]
    Validation(String),

    #[error("Invalid scheduler URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to scheduler failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scheduler API error: {status} {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected scheduler response: {0}")]
    Decode(String),

    #[error("Remote task {0} not found")]
    NotFound(String),

    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}
