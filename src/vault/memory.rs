use super::{FileHandle, FileStore, ListItem, PrecomputedIndex, VaultError};
use crate::task::split_checkbox;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    modified: Option<DateTime<Utc>>,
    index: Option<PrecomputedIndex>,
}

/// In-memory file store with an optional per-file list-item index.
///
/// Stands in for an editor host that keeps a metadata cache: files inserted
/// with [`MemoryVault::insert_indexed`] answer `precomputed_index`, the rest
/// force the collector onto the line-parsing path.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: RwLock<BTreeMap<String, MemoryFile>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: &str, content: &str, modified: Option<DateTime<Utc>>) {
        self.files.write().await.insert(
            path.to_string(),
            MemoryFile {
                content: content.to_string(),
                modified,
                index: None,
            },
        );
    }

    /// Inserts a file together with an index derived from its content.
    pub async fn insert_indexed(&self, path: &str, content: &str, modified: Option<DateTime<Utc>>) {
        self.files.write().await.insert(
            path.to_string(),
            MemoryFile {
                content: content.to_string(),
                modified,
                index: Some(index_from_content(content)),
            },
        );
    }

    pub async fn set_modified(&self, path: &str, modified: DateTime<Utc>) {
        if let Some(file) = self.files.write().await.get_mut(path) {
            file.modified = Some(modified);
        }
    }

    pub async fn content(&self, path: &str) -> Option<String> {
        self.files.read().await.get(path).map(|f| f.content.clone())
    }
}

/// Builds the list-item index a host metadata cache would report.
pub fn index_from_content(content: &str) -> PrecomputedIndex {
    let list_items = content
        .split('\n')
        .enumerate()
        .filter_map(|(line, text)| {
            let (status, rest) = split_checkbox(text.trim_end_matches('\r'))?;
            Some(ListItem {
                status_char: Some(status),
                text: rest.to_string(),
                line,
            })
        })
        .collect();
    PrecomputedIndex { list_items }
}

#[async_trait]
impl FileStore for MemoryVault {
    async fn list_files(&self) -> Result<Vec<FileHandle>, VaultError> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .map(|(path, file)| FileHandle::new(path.clone(), file.modified))
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<String, VaultError> {
        self.content(path).await.ok_or_else(|| VaultError::NotFound {
            path: path.to_string(),
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), VaultError> {
        let mut files = self.files.write().await;
        let now = Some(Utc::now());
        match files.get_mut(path) {
            Some(file) => {
                file.content = content.to_string();
                file.modified = now;
                if file.index.is_some() {
                    file.index = Some(index_from_content(content));
                }
            }
            None => {
                files.insert(
                    path.to_string(),
                    MemoryFile {
                        content: content.to_string(),
                        modified: now,
                        index: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn precomputed_index(&self, file: &FileHandle) -> Option<PrecomputedIndex> {
        self.files.read().await.get(&file.path)?.index.clone()
    }
}
