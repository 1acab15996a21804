//! Document Source Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{extension_of, DocumentRef, DocumentSource},
};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based document source rooted at a vault directory
///
/// Walks the directory tree with `tokio::fs`, skipping hidden entries
/// (names starting with `.`, e.g. `.obsidian`, `.git`) and keeping only
/// files whose extension is in the configured allow-list.
///
/// Paths handed out are relative to the root and use `/` as the separator.
pub struct VaultFileSystem {
    root: PathBuf,
    extensions: Vec<String>,
}

impl VaultFileSystem {
    /// Create a document source that indexes Markdown files only
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extensions(root, vec!["md".to_string()])
    }

    /// Create a document source with a custom extension allow-list
    pub fn with_extensions(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            root: root.into(),
            extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_io_error(e: std::io::Error, path: &str) -> BridgeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.to_string())
        } else {
            BridgeError::Io(e)
        }
    }

    fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }

    fn is_indexable(&self, relative: &str) -> bool {
        extension_of(relative)
            .map(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }

    /// Resolve a collection-relative path, refusing anything that escapes the root
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        let escapes = candidate.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(BridgeError::OperationFailed(format!(
                "path escapes vault root: {}",
                relative
            )));
        }
        Ok(self.root.join(candidate))
    }

    /// Convert an absolute path under the root into a `/`-separated relative path
    pub fn relative_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Whether a relative path would be listed by [`DocumentSource::list_documents`]
    pub fn accepts(&self, relative: &str) -> bool {
        self.is_visible(relative) && self.is_indexable(relative)
    }

    /// No component of the relative path is hidden
    pub(crate) fn is_visible(&self, relative: &str) -> bool {
        !relative.split('/').any(Self::is_hidden)
    }
}

#[async_trait]
impl DocumentSource for VaultFileSystem {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
        let mut documents = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = fs::read_dir(&dir).await.map_err(BridgeError::Io)?;

            while let Some(entry) = read_dir.next_entry().await.map_err(BridgeError::Io)? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if Self::is_hidden(&name) {
                    continue;
                }

                let file_type = entry.file_type().await.map_err(BridgeError::Io)?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let Some(relative) = self.relative_path(&path) else {
                    continue;
                };
                if !self.is_indexable(&relative) {
                    continue;
                }

                let metadata = entry.metadata().await.map_err(BridgeError::Io)?;
                documents.push(DocumentRef {
                    path: relative,
                    size: Some(metadata.len()),
                    modified_at: metadata
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_secs() as i64),
                });
            }
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(root = ?self.root, count = documents.len(), "Listed vault documents");
        Ok(documents)
    }

    async fn read_document(&self, path: &str) -> Result<String> {
        let absolute = self.resolve(path)?;
        let data = fs::read(&absolute)
            .await
            .map_err(|e| Self::map_io_error(e, path))?;
        debug!(path = %path, size = data.len(), "Read document");
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_lists_markdown_with_relative_paths() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "alpha").await;
        write(dir.path(), "notes/Daily.MD", "daily").await;
        write(dir.path(), "image.png", "binary").await;
        write(dir.path(), ".obsidian/workspace.md", "hidden").await;

        let source = VaultFileSystem::new(dir.path());
        let docs = source.list_documents().await.unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();

        assert_eq!(paths, vec!["a.md", "notes/Daily.MD"]);
        assert_eq!(docs[0].size, Some(5));
    }

    #[tokio::test]
    async fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "alpha").await;
        write(dir.path(), "b.txt", "beta").await;

        let source =
            VaultFileSystem::with_extensions(dir.path(), vec![".txt".to_string()]);
        let docs = source.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "b.txt");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let source = VaultFileSystem::new(dir.path());

        let err = source.read_document("gone.md").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(p) if p == "gone.md"));
        assert!(!source.exists("gone.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let source = VaultFileSystem::new(dir.path());

        let err = source.read_document("../secret.md").await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[test]
    fn test_accepts() {
        let source = VaultFileSystem::new("/vault");
        assert!(source.accepts("notes/a.md"));
        assert!(!source.accepts(".trash/a.md"));
        assert!(!source.accepts("notes/a.pdf"));
        assert_eq!(
            source.relative_path(Path::new("/vault/notes/a.md")),
            Some("notes/a.md".to_string())
        );
        assert_eq!(source.relative_path(Path::new("/elsewhere/a.md")), None);
    }
}
