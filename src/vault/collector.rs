//! Task collection across the vault and targeted single-line rewrites.

use super::{FileHandle, FileStore, GlobPattern, PrecomputedIndex, VaultError};
use crate::task::{
    CanonicalTask, TaskFields, TaskFilter, TaskLineParser, TaskLocation, TaskPatch, TaskSource,
    extract_metadata, is_completed_status, render_line, splice_content, split_checkbox,
};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

static LINE_PARTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*[-*]\s*\[)(.)(\]\s*)(.+)$").expect("valid task line parts regex")
});

/// Files read at once while collecting.
const READ_CONCURRENCY: usize = 8;

enum Loaded {
    Indexed(Vec<CanonicalTask>),
    Parsed(Vec<CanonicalTask>),
    Skipped,
}

/// Aggregates canonical tasks from every eligible file of a [`FileStore`].
pub struct TaskCollector {
    store: Arc<dyn FileStore>,
    parser: TaskLineParser,
    patterns: Vec<GlobPattern>,
}

impl TaskCollector {
    pub fn new(store: Arc<dyn FileStore>, filter: TaskFilter, patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match GlobPattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid task file pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            store,
            parser: TaskLineParser::new(filter),
            patterns,
        }
    }

    pub fn filter(&self) -> &TaskFilter {
        self.parser.filter()
    }

    /// A file qualifies by pattern, by a `tasks` folder, or by `task` in its name.
    pub fn is_eligible(&self, file: &FileHandle) -> bool {
        let path = file.path.as_str();
        self.patterns.iter().any(|p| p.matches(path))
            || path.contains("/tasks/")
            || path.starts_with("tasks/")
            || file.name().to_lowercase().contains("task")
    }

    pub async fn eligible_files(&self) -> Result<Vec<FileHandle>, VaultError> {
        let files = self.store.list_files().await?;
        Ok(files.into_iter().filter(|f| self.is_eligible(f)).collect())
    }

    /// Collects every task from every eligible file.
    ///
    /// Files exposing a non-empty precomputed index are served from it, the
    /// rest are read and parsed line by line. A file that cannot be read is
    /// skipped with a warning. Files are loaded concurrently but tasks keep
    /// the file listing order.
    pub async fn collect_tasks(&self) -> Result<Vec<CanonicalTask>, VaultError> {
        let files = self.eligible_files().await?;
        let loaded: Vec<Loaded> = stream::iter(&files)
            .map(|file| self.load_file(file))
            .buffered(READ_CONCURRENCY)
            .collect()
            .await;

        let mut tasks = Vec::new();
        let mut seen = HashSet::new();
        let (mut indexed, mut parsed) = (0usize, 0usize);

        for file_tasks in loaded {
            let file_tasks = match file_tasks {
                Loaded::Indexed(file_tasks) => {
                    indexed += 1;
                    file_tasks
                }
                Loaded::Parsed(file_tasks) => {
                    parsed += 1;
                    file_tasks
                }
                Loaded::Skipped => continue,
            };

            for task in file_tasks {
                if seen.insert(task.id.clone()) {
                    tasks.push(task);
                } else {
                    warn!("Duplicate task id {}, keeping the first occurrence", task.id);
                }
            }
        }

        info!(
            "Collected {} tasks ({} files indexed, {} parsed)",
            tasks.len(),
            indexed,
            parsed
        );
        Ok(tasks)
    }

    async fn load_file(&self, file: &FileHandle) -> Loaded {
        if let Some(index) = self.store.precomputed_index(file).await
            && !index.list_items.is_empty()
        {
            return Loaded::Indexed(self.tasks_from_index(file, &index));
        }

        match self.store.read_file(&file.path).await {
            Ok(content) => {
                Loaded::Parsed(self.parser.parse_file(&content, &file.path, file.modified))
            }
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", file.path, e);
                Loaded::Skipped
            }
        }
    }

    fn tasks_from_index(&self, file: &FileHandle, index: &PrecomputedIndex) -> Vec<CanonicalTask> {
        index
            .list_items
            .iter()
            .filter_map(|item| {
                let status = item.status_char?;
                // The index carries no indentation or bullet; the line is rebuilt as `- [s] text`.
                let raw = format!("- [{}] {}", status, item.text.trim());
                let mut task = self.parser.build(
                    status,
                    &item.text,
                    TaskLocation::new(file.path.clone(), item.line + 1),
                    &raw,
                    TaskSource::Index,
                )?;
                task.last_modified = file.modified;
                Some(task)
            })
            .collect()
    }

    /// Rewrites the line a task was collected from.
    pub async fn update_task_in_place(
        &self,
        task: &CanonicalTask,
        patch: &TaskPatch,
    ) -> Result<(), VaultError> {
        self.update_at(&task.location(), patch).await
    }

    /// Rewrites one line of one file; every other byte of the file is kept.
    pub async fn update_at(&self, location: &TaskLocation, patch: &TaskPatch) -> Result<(), VaultError> {
        let content = self.store.read_file(&location.path).await?;
        let lines: Vec<&str> = content.split('\n').collect();

        let index = line_index(location, lines.len())?;

        let updated = update_task_line(lines[index], patch, self.filter()).ok_or_else(|| {
            VaultError::NotATask {
                path: location.path.clone(),
                line: location.line,
            }
        })?;

        if updated == lines[index] {
            debug!("{} already up to date", location);
            return Ok(());
        }

        let new_content = lines
            .iter()
            .enumerate()
            .map(|(i, line)| if i == index { updated.as_str() } else { *line })
            .collect::<Vec<_>>()
            .join("\n");
        self.store.write_file(&location.path, &new_content).await?;
        debug!("Updated task line {}", location);
        Ok(())
    }

    /// Fields of the task currently on a line, ignoring collection filters.
    pub async fn read_fields_at(&self, location: &TaskLocation) -> Result<TaskFields, VaultError> {
        let content = self.store.read_file(&location.path).await?;
        let lines: Vec<&str> = content.split('\n').collect();
        let index = line_index(location, lines.len())?;

        let (status, text) = split_checkbox(lines[index].trim_end_matches('\r')).ok_or_else(|| {
            VaultError::NotATask {
                path: location.path.clone(),
                line: location.line,
            }
        })?;
        let extraction = extract_metadata(text);
        let metadata = extraction.metadata;

        Ok(TaskFields {
            description: extraction.cleaned,
            completed: is_completed_status(status),
            priority: metadata.priority,
            due_date: metadata.due_date,
            scheduled_date: metadata.scheduled_date,
            start_date: metadata.start_date,
            tags: metadata.tags,
        })
    }

    /// Appends a new open task line to `path` and returns where it landed.
    pub async fn append_task(&self, path: &str, content: &str) -> Result<TaskLocation, VaultError> {
        let mut existing = match self.store.read_file(path).await {
            Ok(existing) => existing,
            Err(VaultError::NotFound { .. }) => String::new(),
            Err(e) => return Err(e),
        };

        if !existing.is_empty() && !existing.ends_with('\n') {
            existing.push('\n');
        }
        let line = existing.split('\n').count();
        existing.push_str(&render_line(false, content));
        existing.push('\n');

        self.store.write_file(path, &existing).await?;
        Ok(TaskLocation::new(path, line))
    }
}

fn line_index(location: &TaskLocation, len: usize) -> Result<usize, VaultError> {
    location
        .line
        .checked_sub(1)
        .filter(|i| *i < len)
        .ok_or_else(|| VaultError::LineOutOfRange {
            path: location.path.clone(),
            line: location.line,
            len,
        })
}

/// Applies a patch to a single task line.
///
/// Completion swaps the status character. Field changes are spliced into the
/// existing content token by token, see [`splice_content`]. Indentation,
/// bullet, annotations and a trailing `\r` are kept. Returns `None` when the
/// line is not a task line.
pub fn update_task_line(line: &str, patch: &TaskPatch, filter: &TaskFilter) -> Option<String> {
    let (body, eol) = match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    };
    let caps = LINE_PARTS_RE.captures(body)?;
    let prefix = caps.get(1)?.as_str();
    let status = caps.get(2)?.as_str().chars().next()?;
    let separator = caps.get(3)?.as_str();
    let content = caps.get(4)?.as_str();

    let completed = patch.completed.unwrap_or(is_completed_status(status));
    let new_status = if completed == is_completed_status(status) {
        status
    } else if completed {
        'x'
    } else {
        ' '
    };

    let content = if patch.is_status_only() {
        content.to_string()
    } else {
        splice_content(content, patch, filter)
    };
    Some(format!("{}{}{}{}{}", prefix, new_status, separator, content, eol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    fn no_filter() -> TaskFilter {
        TaskFilter::default()
    }

    #[test]
    fn test_status_only_update_touches_one_char() {
        let line = "   * [ ] Call   mom (A)  📅 2025-01-01 #family";
        let updated = update_task_line(line, &TaskPatch::completion(true), &no_filter()).unwrap();
        assert_eq!(updated, "   * [x] Call   mom (A)  📅 2025-01-01 #family");

        let reopened = update_task_line(&updated, &TaskPatch::completion(false), &no_filter()).unwrap();
        assert_eq!(reopened, line);
    }

    #[test]
    fn test_unrecognized_status_kept_when_still_open() {
        let line = "- [/] In progress";
        let updated = update_task_line(line, &TaskPatch::completion(false), &no_filter()).unwrap();
        assert_eq!(updated, line);
    }

    #[test]
    fn test_field_update_keeps_annotations_and_keyword_dates() {
        let line = "  * [ ] Write proposal [#Work Tasks] [@mornings] due:2025-03-30 1h30m\r";
        let patch = TaskPatch {
            due_date: Some("2025-04-01".to_string()),
            completed: Some(true),
            ..Default::default()
        };
        let updated = update_task_line(line, &patch, &no_filter()).unwrap();
        assert_eq!(
            updated,
            "  * [x] Write proposal [#Work Tasks] [@mornings] due:2025-04-01 1h30m\r"
        );
    }

    #[test]
    fn test_field_update_splices_tokens_and_keeps_carriage_return() {
        let patch = TaskPatch {
            due_date: Some("2025-02-01".to_string()),
            priority: Some("B".to_string()),
            ..Default::default()
        };
        let updated =
            update_task_line("  - [ ] Draft memo (A) #work\r", &patch, &no_filter()).unwrap();
        assert_eq!(updated, "  - [ ] Draft memo (B) #work 📅 2025-02-01\r");
    }

    #[test]
    fn test_filter_marker_survives_rebuild() {
        let filter = TaskFilter {
            global_task_filter: "@todo".to_string(),
            ..Default::default()
        };
        let patch = TaskPatch {
            description: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = update_task_line("- [ ] @todo Old name", &patch, &filter).unwrap();
        assert_eq!(updated, "- [ ] @todo Renamed");
    }

    #[test]
    fn test_non_task_line_rejected() {
        assert!(update_task_line("- plain", &TaskPatch::completion(true), &no_filter()).is_none());
    }

    #[tokio::test]
    async fn test_eligibility_rules_broaden_patterns() {
        let store = Arc::new(MemoryVault::new());
        let collector = TaskCollector::new(store, no_filter(), &["Projects/*.md".to_string()]);

        for (path, expected) in [
            ("Projects/plan.md", true),
            ("notes/tasks/today.md", true),
            ("tasks/today.md", true),
            ("Journal/My TASKS.md", true),
            ("Journal/2025-01-01.md", false),
        ] {
            assert_eq!(
                collector.is_eligible(&FileHandle::new(path, None)),
                expected,
                "{}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_update_at_out_of_range() {
        let store = Arc::new(MemoryVault::new());
        store.insert("a.md", "- [ ] One", None).await;
        let collector = TaskCollector::new(store, no_filter(), &[]);

        let err = collector
            .update_at(&TaskLocation::new("a.md", 5), &TaskPatch::completion(true))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::LineOutOfRange { line: 5, len: 1, .. }));
    }

    #[tokio::test]
    async fn test_read_fields_ignores_filters() {
        let store = Arc::new(MemoryVault::new());
        store
            .insert("a.md", "intro\r\n- [x] Paid rent (B) #home\r\n", None)
            .await;
        let collector = TaskCollector::new(store, no_filter(), &[]);

        let fields = collector
            .read_fields_at(&TaskLocation::new("a.md", 2))
            .await
            .unwrap();
        assert!(fields.completed);
        assert_eq!(fields.description, "Paid rent");
        assert_eq!(fields.priority.as_deref(), Some("B"));

        assert!(matches!(
            collector.read_fields_at(&TaskLocation::new("a.md", 1)).await,
            Err(VaultError::NotATask { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_append_task_line_numbers() {
        let store = Arc::new(MemoryVault::new());
        store.insert("Tasks.md", "# Inbox", None).await;
        let collector = TaskCollector::new(store.clone(), no_filter(), &[]);

        let first = collector.append_task("Tasks.md", "First").await.unwrap();
        let second = collector.append_task("Tasks.md", "Second").await.unwrap();
        let fresh = collector.append_task("New.md", "Third").await.unwrap();

        assert_eq!(first.line, 2);
        assert_eq!(second.line, 3);
        assert_eq!(fresh.line, 1);
        assert_eq!(
            store.content("Tasks.md").await.unwrap(),
            "# Inbox\n- [ ] First\n- [ ] Second\n"
        );
    }
}
