use super::{FileHandle, FileStore, VaultError};
use crate::env;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;
use tracing::{debug, warn};

/// A vault backed by a directory of markdown files.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a vault-relative path, rejecting anything that escapes the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, VaultError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn io_error(path: &str, source: std::io::Error) -> VaultError {
        if source.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound {
                path: path.to_string(),
            }
        } else {
            VaultError::Io {
                path: path.to_string(),
                source,
            }
        }
    }

    fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl FileStore for FsVault {
    async fn list_files(&self) -> Result<Vec<FileHandle>, VaultError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match async_fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == self.root => {
                    return Err(Self::io_error(&dir.display().to_string(), e));
                }
                Err(e) => {
                    warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Stopped listing {}: {}", dir.display(), e);
                        break;
                    }
                };
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if !hidden {
                        pending.push(path);
                    }
                    continue;
                }

                if hidden || path.extension().and_then(|e| e.to_str()) != Some(env::MARKDOWN_EXTENSION)
                {
                    continue;
                }

                let Some(name) = self.relative_name(&path) else {
                    debug!("Skipping non UTF-8 path {:?}", path);
                    continue;
                };
                let modified = entry
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(chrono::DateTime::<chrono::Utc>::from);

                files.push(FileHandle::new(name, modified));
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Enumerated {} markdown files under {:?}", files.len(), self.root);
        Ok(files)
    }

    async fn read_file(&self, path: &str) -> Result<String, VaultError> {
        let full = self.resolve(path)?;
        async_fs::read_to_string(&full)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), VaultError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(path, e))?;
        }
        async_fs::write(&full, content)
            .await
            .map_err(|e| Self::io_error(path, e))?;
        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_files_skips_hidden_and_non_markdown() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Projects/2025")).unwrap();
        std::fs::create_dir_all(dir.path().join(".vts")).unwrap();
        std::fs::write(dir.path().join("Inbox.md"), "- [ ] a").unwrap();
        std::fs::write(dir.path().join("Projects/2025/plan.md"), "- [ ] b").unwrap();
        std::fs::write(dir.path().join("Projects/image.png"), "x").unwrap();
        std::fs::write(dir.path().join(".vts/state.md"), "x").unwrap();

        let vault = FsVault::new(dir.path());
        let files = vault.list_files().await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(names, vec!["Inbox.md", "Projects/2025/plan.md"]);
        assert!(files.iter().all(|f| f.modified.is_some()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("Locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("secret.md"), "- [ ] s").unwrap();
        std::fs::write(dir.path().join("Inbox.md"), "- [ ] a").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let listed = FsVault::new(dir.path()).list_files().await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let files = listed.expect("Listing should survive an unreadable subdirectory");
        let names: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(names.contains(&"Inbox.md"));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path().join("absent"));
        assert!(vault.list_files().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());

        assert!(matches!(
            vault.read_file("../secret.md").await,
            Err(VaultError::InvalidPath { .. })
        ));
        assert!(matches!(
            vault.write_file("/etc/passwd", "").await,
            Err(VaultError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_read_back() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());

        vault.write_file("new/dir/Tasks.md", "- [ ] x\n").await.unwrap();
        assert_eq!(vault.read_file("new/dir/Tasks.md").await.unwrap(), "- [ ] x\n");
        assert!(matches!(
            vault.read_file("missing.md").await,
            Err(VaultError::NotFound { .. })
        ));
    }
}
