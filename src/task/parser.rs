//! Task line parsing
//!
//! Two views of the same checkbox syntax:
//! - [`TaskLineParser`] builds full [`CanonicalTask`] records for collection and sync
//! - [`parse_syncable_tasks`] builds the lighter [`ParsedTask`] used for outbound email
//!
//! Neither fails on malformed input: lines that are not tasks, or that fail a
//! filter predicate, are skipped.

use super::tokens::{DateField, extract_metadata};
use super::types::{CanonicalTask, TaskFilter, TaskLocation, TaskSource};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static CHECKBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*]\s*\[(.)\]\s*(.+)$").expect("valid checkbox regex"));

static OPEN_CHECKBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*-\s*\[ \]\s+(.*)").expect("valid open checkbox regex"));

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+[hm]").expect("valid duration regex"));

static START_RE: Lazy<Regex> = Lazy::new(|| email_date_regex(DateField::Start));
static DUE_RE: Lazy<Regex> = Lazy::new(|| email_date_regex(DateField::Due));

fn email_date_regex(field: DateField) -> Regex {
    Regex::new(&format!(
        r"\s*{}\s*(\d{{4}}-\d{{2}}-\d{{2}})\b",
        regex::escape(field.symbol())
    ))
    .expect("valid email date regex")
}

/// Splits a checkbox line into its status character and content.
pub fn split_checkbox(line: &str) -> Option<(char, &str)> {
    let caps = CHECKBOX_RE.captures(line)?;
    let status = caps.get(1)?.as_str().chars().next()?;
    let content = caps.get(2)?.as_str();
    Some((status, content))
}

/// `x` (either case) marks a task complete; anything else is open.
pub fn is_completed_status(status: char) -> bool {
    status.eq_ignore_ascii_case(&'x')
}

/// Parses single lines into canonical tasks under a fixed filter.
#[derive(Debug, Clone, Default)]
pub struct TaskLineParser {
    filter: TaskFilter,
}

impl TaskLineParser {
    pub fn new(filter: TaskFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    /// Parses one line of `file_path` (1-based `line_number`).
    pub fn parse_line(
        &self,
        line: &str,
        file_path: &str,
        line_number: usize,
    ) -> Option<CanonicalTask> {
        let (status, content) = split_checkbox(line)?;
        self.build(
            status,
            content,
            TaskLocation::new(file_path, line_number),
            line.trim_end_matches('\r'),
            TaskSource::Parsed,
        )
    }

    /// Parses every line of a file's content.
    pub fn parse_content(&self, content: &str, file_path: &str) -> Vec<CanonicalTask> {
        content
            .split('\n')
            .enumerate()
            .filter_map(|(index, line)| self.parse_line(line, file_path, index + 1))
            .collect()
    }

    /// Builds a task from an already-split status character and content.
    pub fn build(
        &self,
        status: char,
        content: &str,
        location: TaskLocation,
        raw_content: &str,
        source: TaskSource,
    ) -> Option<CanonicalTask> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let completed = is_completed_status(status);
        if completed && !self.filter.include_completed_tasks {
            return None;
        }

        if !self.filter.admits(content) {
            debug!("Skipping {}: filter markers absent", location);
            return None;
        }

        let extraction = extract_metadata(content);

        Some(CanonicalTask {
            id: location.id(),
            description: extraction.cleaned,
            completed,
            metadata: extraction.metadata,
            raw_content: raw_content.to_string(),
            file_path: location.path,
            line_number: location.line,
            last_modified: None,
            source,
        })
    }

    /// Same as [`TaskLineParser::parse_content`], stamping every task with `modified`.
    pub fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        modified: Option<DateTime<Utc>>,
    ) -> Vec<CanonicalTask> {
        let mut tasks = self.parse_content(content, file_path);
        for task in &mut tasks {
            task.last_modified = modified;
        }
        tasks
    }
}

/// Email-oriented view of an open task line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTask {
    pub raw: String,
    /// 0-based line index within the file
    pub line_number: usize,
    pub should_sync: bool,
    pub subject: String,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub body_extras: String,
}

impl ParsedTask {
    /// Derives the email view from a canonical task.
    pub fn from_canonical(task: &CanonicalTask) -> Self {
        let (subject, body_extras) = split_subject(&task.description);
        Self {
            raw: task.raw_content.clone(),
            line_number: task.line_number.saturating_sub(1),
            should_sync: true,
            subject,
            start_date: task.metadata.start_date.clone(),
            due_date: task.metadata.due_date.clone(),
            body_extras,
        }
    }
}

/// Splits cleaned text into a title and trailing annotations.
///
/// Annotations start at the first `[`, or failing that at the first duration
/// estimate such as `1h30m`.
pub fn split_subject(cleaned: &str) -> (String, String) {
    let split = annotation_start(cleaned).unwrap_or(cleaned.len());
    (
        cleaned[..split].trim().to_string(),
        cleaned[split..].trim().to_string(),
    )
}

/// Byte offset of the first `[` annotation or duration estimate.
pub fn annotation_start(text: &str) -> Option<usize> {
    text.find('[')
        .or_else(|| DURATION_RE.find(text).map(|m| m.start()))
}

/// Parses the open, filter-passing task lines of a file for outbound email.
pub fn parse_syncable_tasks(lines: &[&str], filter: &TaskFilter) -> Vec<ParsedTask> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| parse_syncable_line(line, index, filter))
        .collect()
}

fn parse_syncable_line(line: &str, index: usize, filter: &TaskFilter) -> Option<ParsedTask> {
    let caps = OPEN_CHECKBOX_RE.captures(line)?;
    let content = caps.get(1)?.as_str().trim_end_matches('\r');

    if !filter.admits(content) {
        return None;
    }

    let start_date = START_RE.captures(content).map(|c| c[1].to_string());
    let due_date = DUE_RE.captures(content).map(|c| c[1].to_string());

    let cleaned = START_RE.replace(content, " ");
    let cleaned = DUE_RE.replace(&cleaned, " ");
    let cleaned = filter.strip_markers(&cleaned);
    let cleaned = super::tokens::collapse_whitespace(&cleaned);

    let (subject, body_extras) = split_subject(&cleaned);

    Some(ParsedTask {
        raw: line.to_string(),
        line_number: index,
        should_sync: true,
        subject,
        start_date,
        due_date,
        body_extras,
    })
}
