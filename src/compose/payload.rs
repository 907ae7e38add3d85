//! Conversions between vault task fields and scheduler records.

use super::PriorityMap;
use crate::remote::{ExternalTask, RemoteStatus};
use crate::task::{CanonicalTask, TaskFields, TaskLocation};
use chrono::{DateTime, NaiveDate, Utc};

const LONG_DESCRIPTION_CHARS: usize = 100;
const LONG_TASK_MINUTES: u32 = 30;
const SHORT_TASK_MINUTES: u32 = 15;

/// Builds the create/update payload for a collected task.
pub fn build_payload(task: &CanonicalTask, priorities: &PriorityMap) -> ExternalTask {
    payload_from_fields(&task.id, Some(&task.location()), &task.fields(), priorities)
}

/// Builds a payload from syncable fields.
pub fn payload_from_fields(
    task_id: &str,
    location: Option<&TaskLocation>,
    fields: &TaskFields,
    priorities: &PriorityMap,
) -> ExternalTask {
    let estimated = if fields.description.chars().count() > LONG_DESCRIPTION_CHARS {
        LONG_TASK_MINUTES
    } else {
        SHORT_TASK_MINUTES
    };

    ExternalTask {
        id: None,
        title: fields.description.clone(),
        description: location.map(|l| format!("From vault: {}", l)),
        priority: fields
            .priority
            .as_deref()
            .and_then(|p| priorities.translate(p)),
        due_date: fields.due_date.as_deref().map(to_remote_date),
        estimated_duration: Some(estimated),
        tags: fields.tags.clone(),
        status: Some(if fields.completed {
            RemoteStatus::Completed
        } else {
            RemoteStatus::Todo
        }),
        external_id: Some(task_id.to_string()),
        created_time: None,
        updated_time: None,
    }
}

/// Maps a scheduler record back onto vault fields.
pub fn fields_from_external(task: &ExternalTask, priorities: &PriorityMap) -> TaskFields {
    TaskFields {
        description: task.title.trim().to_string(),
        completed: task.is_completed(),
        priority: task
            .priority
            .as_deref()
            .and_then(|p| priorities.translate(p)),
        due_date: task.due_date.as_deref().and_then(from_remote_date),
        scheduled_date: None,
        start_date: None,
        tags: task.tags.clone(),
    }
}

/// `YYYY-MM-DD` becomes midnight UTC; anything else passes through.
pub fn to_remote_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(_) => format!("{}T00:00:00Z", date),
        Err(_) => date.to_string(),
    }
}

/// Reduces a scheduler date or instant to `YYYY-MM-DD`.
pub fn from_remote_date(date: &str) -> Option<String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(date) {
        return Some(instant.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    let prefix = date.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}
