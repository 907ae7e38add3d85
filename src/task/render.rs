//! Canonical reconstruction of task lines from structured fields.

use super::parser::annotation_start;
use super::tokens::{
    DateField, RECURRENCE_SYMBOL, clean, collapse_whitespace, date_value_span, extract_metadata,
    priority_value_span, token_spans,
};
use super::types::{TaskFilter, TaskMetadata, TaskPatch, contains_marker, marker_spans};
use std::ops::Range;

/// Renders task content: description, priority, tags, then dated markers.
pub fn render_content(description: &str, metadata: &TaskMetadata) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !description.trim().is_empty() {
        parts.push(description.trim().to_string());
    }
    if let Some(priority) = &metadata.priority {
        parts.push(format!("({})", priority));
    }
    for tag in &metadata.tags {
        let tag = sanitize_tag(tag);
        if !tag.is_empty() {
            parts.push(format!("#{}", tag));
        }
    }

    let dated = [
        (DateField::Created, &metadata.created_date),
        (DateField::Scheduled, &metadata.scheduled_date),
        (DateField::Start, &metadata.start_date),
        (DateField::Due, &metadata.due_date),
    ];
    for (field, value) in dated {
        if let Some(date) = value {
            parts.push(format!("{} {}", field.symbol(), date));
        }
    }
    if let Some(recurrence) = &metadata.recurrence {
        parts.push(format!("{} {}", RECURRENCE_SYMBOL, recurrence));
    }
    if let Some(done) = &metadata.done_date {
        parts.push(format!("{} {}", DateField::Done.symbol(), done));
    }

    parts.join(" ")
}

/// Renders a complete checkbox line.
pub fn render_line(completed: bool, content: &str) -> String {
    format!("- [{}] {}", if completed { 'x' } else { ' ' }, content)
}

/// Prepends `marker` unless the content already carries it.
pub fn ensure_marker(content: &str, marker: &str) -> String {
    if marker.is_empty() || contains_marker(content, marker) {
        content.to_string()
    } else {
        format!("{} {}", marker, content)
    }
}

/// Applies `patch` to existing task content, editing only what it changes.
///
/// A date or priority that already has a token gets its value replaced where
/// it stands, in the syntax it was written in. Values without a token and
/// tags not yet present are appended. A new description replaces the title,
/// the leading text before any annotation. All other text is left as is.
pub fn splice_content(content: &str, patch: &TaskPatch, filter: &TaskFilter) -> String {
    let mut out = match &patch.description {
        Some(description) => splice_title(content, description, filter),
        None => content.to_string(),
    };

    let dates = [
        (DateField::Due, &patch.due_date),
        (DateField::Scheduled, &patch.scheduled_date),
        (DateField::Start, &patch.start_date),
    ];
    for (field, value) in dates {
        if let Some(date) = value {
            match date_value_span(&out, field) {
                Some(span) => out.replace_range(span, date),
                None => append_token(&mut out, &format!("{} {}", field.symbol(), date)),
            }
        }
    }

    if let Some(priority) = &patch.priority {
        match priority_value_span(&out) {
            Some(span) => out.replace_range(span, priority),
            None => append_token(&mut out, &format!("({})", priority)),
        }
    }

    if let Some(tags) = &patch.tags {
        let mut present = extract_metadata(&out).metadata.tags;
        for tag in tags {
            let tag = sanitize_tag(tag);
            if !tag.is_empty() && !present.contains(&tag) {
                append_token(&mut out, &format!("#{}", tag));
                present.push(tag);
            }
        }
    }

    out
}

fn splice_title(content: &str, description: &str, filter: &TaskFilter) -> String {
    let description = collapse_whitespace(description);
    let current = collapse_whitespace(&filter.strip_markers(&clean(content)));
    if description.is_empty() || description == current {
        return content.to_string();
    }

    // Annotations stay with the vault line; drop them from the new title.
    let extras = &current[annotation_start(&current).unwrap_or(current.len())..];
    let title = match description.strip_suffix(extras) {
        Some(head) if !extras.is_empty() && !head.trim().is_empty() => head.trim().to_string(),
        _ => description.clone(),
    };

    let mut spans = token_spans(content);
    for marker in [&filter.global_task_filter, &filter.required_tag_for_sync] {
        spans.extend(marker_spans(content, marker));
    }
    spans.sort_by_key(|span| (span.start, span.end));

    let mut out = content.to_string();
    match title_range(content, &spans) {
        Some(range) => out.replace_range(range, &title),
        None => out.insert_str(0, &format!("{} ", title)),
    }
    out
}

/// The first run of plain text, up to any annotation.
fn title_range(content: &str, spans: &[Range<usize>]) -> Option<Range<usize>> {
    let mut gaps = Vec::new();
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            gaps.push(cursor..span.start);
        }
        cursor = cursor.max(span.end);
    }
    gaps.push(cursor..content.len());

    for gap in gaps {
        let text = &content[gap.clone()];
        let cut = annotation_start(text);
        let head = &text[..cut.unwrap_or(text.len())];
        let trimmed = head.trim();
        if !trimmed.is_empty() {
            let start = gap.start + (head.len() - head.trim_start().len());
            return Some(start..start + trimmed.len());
        }
        if cut.is_some() {
            return None;
        }
    }
    None
}

fn append_token(content: &mut String, token: &str) {
    let end = content.trim_end().len();
    let token = if end == 0 {
        token.to_string()
    } else {
        format!(" {}", token)
    };
    content.insert_str(end, &token);
}

/// Tags only survive re-parsing when made of word characters and hyphens.
fn sanitize_tag(tag: &str) -> String {
    tag.trim_start_matches('#')
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}
