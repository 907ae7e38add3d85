//! Glob-like path patterns: `**` spans directories, `*` and `?` stay inside one segment.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&translate(pattern))?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_star_matches_any_depth() {
        let pattern = GlobPattern::new("**/*.md").unwrap();
        assert!(pattern.matches("root.md"));
        assert!(pattern.matches("a/b/c.md"));
        assert!(!pattern.matches("a/b/c.txt"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = GlobPattern::new("Projects/*.md").unwrap();
        assert!(pattern.matches("Projects/plan.md"));
        assert!(!pattern.matches("Projects/2025/plan.md"));
        assert!(!pattern.matches("Other/plan.md"));
    }

    #[test]
    fn test_question_mark_and_literals() {
        let pattern = GlobPattern::new("daily/2025-0?-*.md").unwrap();
        assert!(pattern.matches("daily/2025-03-01.md"));
        assert!(!pattern.matches("daily/2025-10-01.md"));
        // `.` is literal, not a regex wildcard
        assert!(!GlobPattern::new("a.md").unwrap().matches("abmd"));
    }

    #[test]
    fn test_trailing_double_star() {
        let pattern = GlobPattern::new("archive/**").unwrap();
        assert!(pattern.matches("archive/2024/old.md"));
        assert!(!pattern.matches("notes/archive.md"));
    }
}
