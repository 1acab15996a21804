//! # Index Metadata
//!
//! What the core remembers about every document it has confirmed on the
//! remote index: the fingerprint it had at that time, the id it was indexed
//! under, and when.
//!
//! The whole mapping is persisted as one JSON array
//! (`[{path, hash, remoteId, indexedAt}]`) and replaced wholesale after each
//! cycle. A record that exists but cannot be decoded is reported as
//! [`SyncError::MetadataCorrupt`]; nothing is guessed from partial data.

use async_trait::async_trait;
use bridge_traits::BlobStore;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, SyncError};

/// One synchronized document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub path: String,
    pub hash: String,
    pub remote_id: String,
    /// Unix milliseconds of the confirming sync
    pub indexed_at: i64,
}

/// In-memory mapping `path -> MetadataEntry`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, MetadataEntry>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded entries, rejecting duplicate paths
    pub fn from_entries(entries: Vec<MetadataEntry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if let Some(previous) = map.insert(entry.path.clone(), entry) {
                return Err(SyncError::MetadataCorrupt {
                    reason: format!("duplicate entry for {}", previous.path),
                });
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, path: &str) -> Option<&MetadataEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn upsert(&mut self, entry: MetadataEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<MetadataEntry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order
    pub fn entries(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_entries(&self) -> Vec<MetadataEntry> {
        self.entries.values().cloned().collect()
    }
}

/// Durable storage of the [`Metadata`] record
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Load the record; an absent record is an empty mapping
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MetadataCorrupt` if a record exists but cannot be decoded.
    async fn load(&self) -> Result<Metadata>;

    /// Atomically replace the record
    async fn save(&self, metadata: &Metadata) -> Result<()>;
}

/// [`MetadataStore`] serializing to JSON in a host [`BlobStore`]
pub struct BlobMetadataStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl BlobMetadataStore {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Metadata> {
        let entries: Vec<MetadataEntry> =
            serde_json::from_slice(data).map_err(|e| SyncError::MetadataCorrupt {
                reason: e.to_string(),
            })?;
        Metadata::from_entries(entries)
    }

    pub fn encode(metadata: &Metadata) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&metadata.to_entries())
            .map_err(|e| SyncError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl MetadataStore for BlobMetadataStore {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn load(&self) -> Result<Metadata> {
        let Some(data) = self.store.read_blob(&self.key).await? else {
            debug!("No metadata record, starting empty");
            return Ok(Metadata::new());
        };

        let metadata = Self::decode(&data)?;
        debug!(entries = metadata.len(), "Loaded metadata record");
        Ok(metadata)
    }

    #[instrument(skip(self, metadata), fields(key = %self.key, entries = metadata.len()))]
    async fn save(&self, metadata: &Metadata) -> Result<()> {
        let data = Self::encode(metadata)?;
        self.store
            .write_blob(&self.key, Bytes::from(data))
            .await
            .map_err(|e| SyncError::Persistence(e.to_string()))?;
        debug!("Saved metadata record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBlobs {
        blobs: Mutex<HashMap<String, Bytes>>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobs {
        async fn read_blob(&self, key: &str) -> BridgeResult<Option<Bytes>> {
            Ok(self.blobs.lock().unwrap().get(key).cloned())
        }

        async fn write_blob(&self, key: &str, data: Bytes) -> BridgeResult<()> {
            self.blobs.lock().unwrap().insert(key.to_string(), data);
            Ok(())
        }

        async fn delete_blob(&self, key: &str) -> BridgeResult<()> {
            self.blobs.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn entry(path: &str, hash: &str) -> MetadataEntry {
        MetadataEntry {
            path: path.to_string(),
            hash: hash.to_string(),
            remote_id: crate::document::document_id(path),
            indexed_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_absent_record_is_empty() {
        let store = BlobMetadataStore::new(Arc::new(MemoryBlobs::default()), "meta.json");
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let blobs = Arc::new(MemoryBlobs::default());
        let store = BlobMetadataStore::new(blobs.clone(), "meta.json");

        let mut metadata = Metadata::new();
        metadata.upsert(entry("b.md", "h2"));
        metadata.upsert(entry("a.md", "h1"));
        store.save(&metadata).await.unwrap();

        assert_eq!(store.load().await.unwrap(), metadata);

        let raw = blobs.blobs.lock().unwrap().get("meta.json").cloned().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json[0]["path"], "a.md");
        assert_eq!(json[0]["remoteId"], "a_2emd");
        assert_eq!(json[0]["indexedAt"], 1_700_000_000_000i64);
    }

    #[tokio::test]
    async fn test_garbage_record_is_corrupt() {
        let blobs = Arc::new(MemoryBlobs::default());
        blobs
            .write_blob("meta.json", Bytes::from_static(b"[{\"path\": \"a.md\""))
            .await
            .unwrap();
        let store = BlobMetadataStore::new(blobs, "meta.json");

        assert!(matches!(
            store.load().await,
            Err(SyncError::MetadataCorrupt { .. })
        ));
    }

    #[test]
    fn test_wrong_shape_and_duplicates_are_corrupt() {
        assert!(matches!(
            BlobMetadataStore::decode(br#"{"path":"a.md"}"#),
            Err(SyncError::MetadataCorrupt { .. })
        ));
        assert!(matches!(
            BlobMetadataStore::decode(b""),
            Err(SyncError::MetadataCorrupt { .. })
        ));

        let dup = serde_json::to_vec(&vec![entry("a.md", "1"), entry("a.md", "2")]).unwrap();
        assert!(matches!(
            BlobMetadataStore::decode(&dup),
            Err(SyncError::MetadataCorrupt { reason }) if reason.contains("a.md")
        ));
    }
}
