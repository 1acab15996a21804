//! Blob Store Implementation backed by a directory

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::BlobStore,
};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Stores each blob as a file named after its key inside a data directory.
///
/// Writes go to `<key>.tmp` first and are renamed over the target, so a
/// crash mid-write leaves the previous record intact.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory (`~/.local/share/vault-search` on Linux)
    pub fn in_data_dir() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("vault-search");
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(BridgeError::OperationFailed(format!(
                "invalid blob key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read_blob(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(key = %key, size = data.len(), "Read blob");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn write_blob(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp_path = self.dir.join(format!("{}.tmp", key));
        fs::write(&tmp_path, data.as_ref()).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(key = %key, size = data.len(), "Wrote blob");
        Ok(())
    }

    async fn delete_blob(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}
