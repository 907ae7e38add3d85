//! Vault file storage
//!
//! The host note editor is reached only through the [`FileStore`] capability:
//! enumerate files, read and overwrite them, and optionally expose a
//! precomputed list-item index. [`FsVault`] serves a directory on disk,
//! [`MemoryVault`] serves tests and embedding hosts.

pub mod collector;
pub mod fs;
pub mod glob;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskFilter;

pub use collector::{TaskCollector, update_task_line};
pub use fs::FsVault;
pub use glob::GlobPattern;
pub use memory::MemoryVault;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("File '{path}' not found")]
    NotFound { path: String },

    #[error("IO error accessing '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Path '{path}' escapes the vault root")]
    InvalidPath { path: String },

    #[error("Line {line} not found in file '{path}' ({len} lines)")]
    LineOutOfRange { path: String, line: usize, len: usize },

    #[error("Line {line} of '{path}' is no longer a task")]
    NotATask { path: String, line: usize },
}

/// A candidate file as enumerated by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Vault-relative path with `/` separators
    pub path: String,
    pub modified: Option<DateTime<Utc>>,
}

impl FileHandle {
    pub fn new(path: impl Into<String>, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// One list item as reported by a host's metadata index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Checkbox status character, `None` for plain bullets
    pub status_char: Option<char>,
    /// Item text after the checkbox
    pub text: String,
    /// 0-based line within the file
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecomputedIndex {
    pub list_items: Vec<ListItem>,
}

/// Host file-storage capability.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Enumerate candidate files.
    async fn list_files(&self) -> Result<Vec<FileHandle>, VaultError>;

    /// Full textual content of a file.
    async fn read_file(&self, path: &str) -> Result<String, VaultError>;

    /// Full-content overwrite, creating the file if needed.
    async fn write_file(&self, path: &str, content: &str) -> Result<(), VaultError>;

    /// Optional fast path: the host's list-item index for a file.
    async fn precomputed_index(&self, _file: &FileHandle) -> Option<PrecomputedIndex> {
        None
    }
}

/// Vault-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default = "default_task_file_patterns")]
    pub task_file_patterns: Vec<String>,
    /// File that receives tasks created on the remote side
    #[serde(default = "default_inbox_file")]
    pub inbox_file: String,
    #[serde(flatten)]
    pub filter: TaskFilter,
}

fn default_task_file_patterns() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

fn default_inbox_file() -> String {
    "Tasks.md".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: None,
            task_file_patterns: default_task_file_patterns(),
            inbox_file: default_inbox_file(),
            filter: TaskFilter::default(),
        }
    }
}
