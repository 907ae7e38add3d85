use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Structured metadata recognized inside a task's free text.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskMetadata {
    /// Adds a tag unless it is already present.
    pub fn push_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

/// Where a task was read from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Built from the host's precomputed list-item index
    Index,
    /// Built by parsing raw file content line by line
    Parsed,
}

/// File path plus 1-based line number of a task line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskLocation {
    pub path: String,
    pub line: usize,
}

impl TaskLocation {
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    /// Stable task identifier: `{path}:{line}`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.path, self.line)
    }

    /// Recovers a location from an identifier produced by [`TaskLocation::id`].
    pub fn parse_id(id: &str) -> Option<Self> {
        let (path, line) = id.rsplit_once(':')?;
        let line: usize = line.parse().ok()?;
        if path.is_empty() || line == 0 {
            return None;
        }
        Some(Self::new(path, line))
    }
}

impl fmt::Display for TaskLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// The normalized, in-memory representation of a vault task.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CanonicalTask {
    pub id: String,
    pub description: String,
    pub completed: bool,
    #[serde(flatten)]
    pub metadata: TaskMetadata,
    /// The source line. Tasks built from a host index get a normalized
    /// `- [s] text` line instead, since the index drops indentation and bullet.
    pub raw_content: String,
    pub file_path: String,
    pub line_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub source: TaskSource,
}

impl CanonicalTask {
    pub fn location(&self) -> TaskLocation {
        TaskLocation::new(self.file_path.clone(), self.line_number)
    }

    /// The subset of fields exchanged during synchronization.
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            description: self.description.clone(),
            completed: self.completed,
            priority: self.metadata.priority.clone(),
            due_date: self.metadata.due_date.clone(),
            scheduled_date: self.metadata.scheduled_date.clone(),
            start_date: self.metadata.start_date.clone(),
            tags: self.metadata.tags.clone(),
        }
    }
}

/// Syncable snapshot of a task, independent of which side produced it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFields {
    pub description: String,
    pub completed: bool,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub scheduled_date: Option<String>,
    pub start_date: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update applied to a task line. `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub scheduled_date: Option<String>,
    pub start_date: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// True when only the checkbox status would change.
    pub fn is_status_only(&self) -> bool {
        self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.scheduled_date.is_none()
            && self.start_date.is_none()
            && self.tags.is_none()
    }

    /// The smallest patch turning `current` into `desired`.
    ///
    /// Fields `desired` leaves unset are kept as they are, and tags are only
    /// ever added.
    pub fn diff(current: &TaskFields, desired: &TaskFields) -> Self {
        fn changed(current: &Option<String>, desired: &Option<String>) -> Option<String> {
            desired.clone().filter(|d| Some(d) != current.as_ref())
        }

        let new_tags: Vec<String> = desired
            .tags
            .iter()
            .filter(|t| !current.tags.contains(t))
            .cloned()
            .collect();

        Self {
            description: Some(desired.description.clone())
                .filter(|d| !d.is_empty() && *d != current.description),
            completed: Some(desired.completed).filter(|c| *c != current.completed),
            priority: changed(&current.priority, &desired.priority),
            due_date: changed(&current.due_date, &desired.due_date),
            scheduled_date: changed(&current.scheduled_date, &desired.scheduled_date),
            start_date: changed(&current.start_date, &desired.start_date),
            tags: Some(new_tags).filter(|t| !t.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_status_only() && self.completed.is_none()
    }

    /// Overlays this patch on existing metadata and description.
    pub fn merge_into(&self, description: &mut String, metadata: &mut TaskMetadata) {
        if let Some(d) = &self.description {
            *description = d.clone();
        }
        if let Some(p) = &self.priority {
            metadata.priority = Some(p.clone());
        }
        if let Some(d) = &self.due_date {
            metadata.due_date = Some(d.clone());
        }
        if let Some(d) = &self.scheduled_date {
            metadata.scheduled_date = Some(d.clone());
        }
        if let Some(d) = &self.start_date {
            metadata.start_date = Some(d.clone());
        }
        if let Some(tags) = &self.tags {
            for tag in tags {
                metadata.push_tag(tag);
            }
        }
    }
}

impl From<&TaskFields> for TaskPatch {
    fn from(fields: &TaskFields) -> Self {
        Self {
            description: Some(fields.description.clone()).filter(|d| !d.is_empty()),
            completed: Some(fields.completed),
            priority: fields.priority.clone(),
            due_date: fields.due_date.clone(),
            scheduled_date: fields.scheduled_date.clone(),
            start_date: fields.start_date.clone(),
            tags: Some(fields.tags.clone()).filter(|t| !t.is_empty()),
        }
    }
}

/// Collection-level predicates applied while parsing task lines.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    #[serde(default)]
    pub include_completed_tasks: bool,
    /// Marker every collected task must carry, e.g. `#task`. Empty disables it.
    #[serde(default)]
    pub global_task_filter: String,
    /// Additional marker required before a task is synced. Empty disables it.
    #[serde(default)]
    pub required_tag_for_sync: String,
}

impl TaskFilter {
    /// Checks the global filter and required tag against the original content.
    pub fn admits(&self, content: &str) -> bool {
        [&self.global_task_filter, &self.required_tag_for_sync]
            .into_iter()
            .filter(|marker| !marker.is_empty())
            .all(|marker| contains_marker(content, marker))
    }

    /// Removes every configured marker from `content`.
    pub fn strip_markers(&self, content: &str) -> String {
        [&self.global_task_filter, &self.required_tag_for_sync]
            .into_iter()
            .filter(|marker| !marker.is_empty())
            .fold(content.to_string(), |acc, marker| remove_marker(&acc, marker))
    }
}

fn is_marker_start(content: &str, at: usize) -> bool {
    content[..at]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace)
}

fn is_marker_end(content: &str, at: usize) -> bool {
    content[at..]
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || matches!(c, '.' | ',' | ';' | '!' | '?'))
}

/// Whole-word occurrence test: the marker must start at the beginning or after
/// whitespace, and end at the end, before whitespace, or before `.,;!?`.
pub fn contains_marker(content: &str, marker: &str) -> bool {
    !marker_spans(content, marker).is_empty()
}

/// Byte ranges of every whole-word occurrence of `marker`.
pub fn marker_spans(content: &str, marker: &str) -> Vec<Range<usize>> {
    if marker.is_empty() {
        return Vec::new();
    }
    content
        .match_indices(marker)
        .map(|(at, m)| at..at + m.len())
        .filter(|span| is_marker_start(content, span.start) && is_marker_end(content, span.end))
        .collect()
}

/// Replaces every whole-word occurrence of `marker` with a single space.
pub fn remove_marker(content: &str, marker: &str) -> String {
    if marker.is_empty() {
        return content.to_string();
    }
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (at, m) in content.match_indices(marker) {
        if at < last {
            continue;
        }
        if is_marker_start(content, at) && is_marker_end(content, at + m.len()) {
            out.push_str(&content[last..at]);
            out.push(' ');
            last = at + m.len();
        }
    }
    out.push_str(&content[last..]);
    out
}
