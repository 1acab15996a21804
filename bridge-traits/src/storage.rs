//! Storage and Vault Abstractions
//!
//! Provides platform-agnostic traits for enumerating and reading the local
//! document collection, receiving change notifications, and persisting small
//! blobs (index metadata, settings).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A document known to the local collection.
///
/// `path` is relative to the collection root and always uses `/` as the
/// separator, so it stays stable across platforms and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Collection-relative path, e.g. `notes/Daily.md`
    pub path: String,
    /// Size in bytes, when the host knows it cheaply
    pub size: Option<u64>,
    /// Last modification time (Unix seconds), when available
    pub modified_at: Option<i64>,
}

impl DocumentRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
            modified_at: None,
        }
    }

    /// File extension without the dot, lowercased
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// Returns the lowercased extension of a collection path.
pub fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Change notification emitted by the host for a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VaultEvent {
    Created { path: String },
    Modified { path: String },
    Deleted { path: String },
    Renamed { from: String, to: String },
    /// A directory was created, removed or renamed. The documents beneath it
    /// are not listed, so consumers must rescan the collection.
    FolderChanged { path: String },
}

impl VaultEvent {
    /// Every path touched by this event
    pub fn paths(&self) -> Vec<&str> {
        match self {
            VaultEvent::Created { path }
            | VaultEvent::Modified { path }
            | VaultEvent::Deleted { path }
            | VaultEvent::FolderChanged { path } => vec![path.as_str()],
            VaultEvent::Renamed { from, to } => vec![from.as_str(), to.as_str()],
        }
    }

    /// True when the event cannot be reduced to individual document paths
    pub fn requires_rescan(&self) -> bool {
        matches!(self, VaultEvent::FolderChanged { .. })
    }
}

/// Read access to the local document collection.
///
/// Abstracts the host's file APIs:
/// - Desktop: a directory tree on disk
/// - Editor plugins: the editor's vault API
/// - Tests: an in-memory map
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::DocumentSource;
///
/// async fn count(source: &dyn DocumentSource) -> Result<usize> {
///     Ok(source.list_documents().await?.len())
/// }
/// ```
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Enumerate every document currently in the collection
    async fn list_documents(&self) -> Result<Vec<DocumentRef>>;

    /// Read the full content of a document
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::NotFound` if the document no longer exists.
    async fn read_document(&self, path: &str) -> Result<String>;

    /// Check whether a document currently exists
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.read_document(path).await {
            Ok(_) => Ok(true),
            Err(crate::error::BridgeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Small persisted blob storage.
///
/// Implementations MUST replace a blob atomically: a concurrent reader sees
/// either the previous bytes or the new bytes, never a torn write.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::BlobStore;
///
/// async fn save(store: &dyn BlobStore, data: Bytes) -> Result<()> {
///     store.write_blob("index-metadata.json", data).await
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, returning `Ok(None)` if it has never been written
    async fn read_blob(&self, key: &str) -> Result<Option<Bytes>>;

    /// Atomically replace a blob
    async fn write_blob(&self, key: &str, data: Bytes) -> Result<()>;

    /// Delete a blob; deleting a missing blob is not an error
    async fn delete_blob(&self, key: &str) -> Result<()>;
}
