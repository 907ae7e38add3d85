//! Metadata token extraction
//!
//! Recognizes the inline markers a vault task line can carry and removes them
//! from the free text:
//! - Priority: `(A)` surrounded by whitespace
//! - Dates: `📅`/`due:`, `⏳`/`scheduled:`, `🛫`/`start:`, `✅`/`done:`,
//!   `➕`/`created:`, each followed by `YYYY-MM-DD`
//! - Recurrence: `🔁`/`recur:` followed by one word
//! - Tags: `#` followed by word characters or hyphens
//!
//! Extraction runs to a fixpoint, so cleaning already-cleaned text is a no-op.

use super::types::TaskMetadata;
use once_cell::sync::Lazy;
use regex::Regex;
use std::iter;
use std::ops::Range;

/// Date-carrying fields and their two accepted marker syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Due,
    Scheduled,
    Start,
    Done,
    Created,
}

impl DateField {
    pub const ALL: [DateField; 5] = [
        DateField::Due,
        DateField::Scheduled,
        DateField::Start,
        DateField::Done,
        DateField::Created,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            DateField::Due => "📅",
            DateField::Scheduled => "⏳",
            DateField::Start => "🛫",
            DateField::Done => "✅",
            DateField::Created => "➕",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DateField::Due => "due",
            DateField::Scheduled => "scheduled",
            DateField::Start => "start",
            DateField::Done => "done",
            DateField::Created => "created",
        }
    }

    fn slot(self, metadata: &mut TaskMetadata) -> &mut Option<String> {
        match self {
            DateField::Due => &mut metadata.due_date,
            DateField::Scheduled => &mut metadata.scheduled_date,
            DateField::Start => &mut metadata.start_date,
            DateField::Done => &mut metadata.done_date,
            DateField::Created => &mut metadata.created_date,
        }
    }
}

pub const RECURRENCE_SYMBOL: &str = "🔁";
pub const RECURRENCE_KEYWORD: &str = "recur";

struct DatePatterns {
    field: DateField,
    symbol: Regex,
    keyword: Regex,
}

// The optional U+FE0F lets emoji-presentation variants match too.
static DATE_PATTERNS: Lazy<Vec<DatePatterns>> = Lazy::new(|| {
    DateField::ALL
        .into_iter()
        .map(|field| DatePatterns {
            field,
            symbol: Regex::new(&format!(
                r"{}\x{{FE0F}}?\s*(\d{{4}}-\d{{2}}-\d{{2}})\b",
                regex::escape(field.symbol())
            ))
            .expect("valid date symbol regex"),
            keyword: Regex::new(&format!(
                r"\b{}:(\d{{4}}-\d{{2}}-\d{{2}})\b",
                field.keyword()
            ))
            .expect("valid date keyword regex"),
        })
        .collect()
});

static RECURRENCE_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(&format!(
            r"{}\x{{FE0F}}?\s*(\S+)",
            regex::escape(RECURRENCE_SYMBOL)
        ))
        .expect("valid recurrence symbol regex"),
        Regex::new(&format!(r"\b{}:(\S+)", RECURRENCE_KEYWORD))
            .expect("valid recurrence keyword regex"),
    ]
});

static PRIORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\(([^\s()]+)\)\s").expect("valid priority regex"));

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([\w-]+)").expect("valid tag regex"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Result of running the extractor over a text fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub metadata: TaskMetadata,
    pub cleaned: String,
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Extracts all recognized tokens from `text`.
///
/// When a field occurs more than once the first occurrence wins, and the
/// symbol syntax wins over the keyword syntax for dates. Every occurrence is
/// removed from the cleaned text regardless.
pub fn extract_metadata(text: &str) -> Extraction {
    let mut metadata = TaskMetadata::default();
    let mut current = collapse_whitespace(text);

    loop {
        let next = collapse_whitespace(&strip_pass(&current, &mut metadata));
        if next == current {
            break;
        }
        current = next;
    }

    Extraction {
        metadata,
        cleaned: current,
    }
}

/// Cleaned description only. `clean(clean(s)) == clean(s)` for every `s`.
pub fn clean(text: &str) -> String {
    extract_metadata(text).cleaned
}

/// Byte range of the first `field` date value, symbol syntax first.
pub fn date_value_span(text: &str, field: DateField) -> Option<Range<usize>> {
    let patterns = DATE_PATTERNS.iter().find(|p| p.field == field)?;
    [&patterns.symbol, &patterns.keyword]
        .into_iter()
        .find_map(|re| re.captures(text)?.get(1).map(|m| m.range()))
}

/// Byte range of the first priority value, the `A` of `(A)`.
pub fn priority_value_span(text: &str) -> Option<Range<usize>> {
    let padded = format!(" {} ", text);
    let value = PRIORITY_RE.captures(&padded)?.get(1)?;
    Some(value.start() - 1..value.end() - 1)
}

/// Byte ranges of every recognized token in `text`, ordered by start.
pub fn token_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = DATE_PATTERNS
        .iter()
        .flat_map(|p| [&p.symbol, &p.keyword])
        .chain(RECURRENCE_PATTERNS.iter())
        .chain(iter::once(&*TAG_RE))
        .flat_map(|re| re.find_iter(text).map(|m| m.range()))
        .collect();

    // Covers the parentheses, not the surrounding whitespace.
    let padded = format!(" {} ", text);
    spans.extend(
        PRIORITY_RE
            .captures_iter(&padded)
            .filter_map(|caps| caps.get(1))
            .map(|value| value.start() - 2..value.end()),
    );

    spans.sort_by_key(|span| (span.start, span.end));
    spans
}

fn strip_pass(text: &str, metadata: &mut TaskMetadata) -> String {
    let mut text = text.to_string();

    for patterns in DATE_PATTERNS.iter() {
        for re in [&patterns.symbol, &patterns.keyword] {
            text = take_first(re, &text, patterns.field.slot(metadata));
        }
    }

    for re in RECURRENCE_PATTERNS.iter() {
        text = take_first(re, &text, &mut metadata.recurrence);
    }

    for caps in TAG_RE.captures_iter(&text) {
        metadata.push_tag(&caps[1]);
    }
    text = TAG_RE.replace_all(&text, " ").into_owned();

    // Priority needs whitespace on both sides; padding lets it sit at either end.
    let padded = format!(" {} ", text);
    if metadata.priority.is_none()
        && let Some(caps) = PRIORITY_RE.captures(&padded)
    {
        metadata.priority = Some(caps[1].to_string());
    }
    PRIORITY_RE.replace_all(&padded, " ").into_owned()
}

fn take_first(re: &Regex, text: &str, slot: &mut Option<String>) -> String {
    if slot.is_none()
        && let Some(caps) = re.captures(text)
    {
        *slot = Some(caps[1].to_string());
    }
    re.replace_all(text, " ").into_owned()
}
