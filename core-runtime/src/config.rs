//! # Core Configuration
//!
//! Explicit configuration for the vault search core. Every component receives
//! its slice of settings at construction; nothing reads global state.
//!
//! ## Overview
//!
//! [`CoreConfig`] bundles:
//! - Connection settings for the remote search service ([`MeilisearchSettings`])
//! - Reconciliation tuning ([`SyncSettings`])
//! - Interactive search behavior ([`SearchSettings`])
//! - Injected host bridges (HTTP client, document source, blob store, clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MeilisearchSettings};
//!
//! let config = CoreConfig::builder()
//!     .meilisearch(MeilisearchSettings::new("http://127.0.0.1:7700").with_api_key("masterKey"))
//!     .vault_root("/home/me/notes")
//!     .build()?;
//! ```
//!
//! With the `desktop-shims` feature, missing bridges are filled in from
//! `bridge-desktop`. Without it, the host must inject every bridge.

use crate::error::{Error, Result};
use bridge_traits::{BlobStore, Clock, DocumentSource, HttpClient, SystemClock};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_INDEX_NAME: &str = "vault";
pub const DEFAULT_METADATA_KEY: &str = "index-metadata.json";

/// Maximum length the search service accepts for an index uid
const MAX_INDEX_UID_LEN: usize = 400;

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Connection settings for the remote search service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeilisearchSettings {
    /// Base URL, e.g. `http://127.0.0.1:7700`
    pub host: String,
    pub api_key: Option<String>,
    pub index_name: String,
}

impl MeilisearchSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: None,
            index_name: DEFAULT_INDEX_NAME.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::Config(
                "Search service host is required. Use MeilisearchSettings::new(host).".to_string(),
            ));
        }
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Search service host must start with http:// or https://, got {:?}",
                host
            )));
        }
        validate_index_uid(&self.index_name)
    }
}

impl std::fmt::Debug for MeilisearchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeilisearchSettings")
            .field("host", &self.host)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("index_name", &self.index_name)
            .finish()
    }
}

fn validate_index_uid(uid: &str) -> Result<()> {
    if uid.is_empty() {
        return Err(Error::Config("Index name cannot be empty".to_string()));
    }
    if uid.len() > MAX_INDEX_UID_LEN {
        return Err(Error::Config(format!(
            "Index name exceeds {} bytes",
            MAX_INDEX_UID_LEN
        )));
    }
    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Config(format!(
            "Index name {:?} may only contain ASCII letters, digits, '-' and '_'",
            uid
        )));
    }
    Ok(())
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Blob key of the persisted metadata record
    pub metadata_key: String,
    #[serde(with = "duration_ms")]
    pub task_poll_interval: Duration,
    pub task_max_attempts: u32,
    /// Maximum documents per add-or-update or delete task
    pub batch_size: usize,
    /// Run an incremental cycle when the service starts
    pub auto_sync_on_start: bool,
    /// Lowercase extensions (without dot) that are indexed
    pub extensions: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            task_poll_interval: Duration::from_millis(500),
            task_max_attempts: 20,
            batch_size: 100,
            auto_sync_on_start: true,
            extensions: vec!["md".to_string()],
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.metadata_key.trim().is_empty() {
            return Err(Error::Config("Metadata key cannot be empty".to_string()));
        }
        if self.task_poll_interval.is_zero() {
            return Err(Error::Config(
                "Task poll interval must be greater than 0ms".to_string(),
            ));
        }
        if self.task_max_attempts == 0 {
            return Err(Error::Config(
                "Task max attempts must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("Batch size must be greater than 0".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config(
                "At least one document extension must be indexed".to_string(),
            ));
        }
        Ok(())
    }

    /// Worst-case wait for a single remote task
    pub fn task_wait_budget(&self) -> Duration {
        self.task_poll_interval * self.task_max_attempts
    }
}

/// Hybrid search parameters, used when the index has an embedder configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSettings {
    pub embedder: String,
    /// 0.0 = keyword only, 1.0 = semantic only
    pub ratio: f32,
}

/// Interactive search behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    pub limit: usize,
    pub crop_length: usize,
    pub highlight_fields: Vec<String>,
    /// Quiet period after the last keystroke before a query is sent
    #[serde(with = "duration_ms")]
    pub debounce: Duration,
    pub semantic: Option<SemanticSettings>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: 20,
            crop_length: 30,
            highlight_fields: vec!["name".to_string(), "content".to_string()],
            debounce: Duration::from_millis(300),
            semantic: None,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::Config("Search limit must be greater than 0".to_string()));
        }
        if let Some(semantic) = &self.semantic {
            if semantic.embedder.trim().is_empty() {
                return Err(Error::Config(
                    "Semantic search requires an embedder name".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&semantic.ratio) {
                return Err(Error::Config(format!(
                    "Semantic ratio must be within [0, 1], got {}",
                    semantic.ratio
                )));
            }
        }
        Ok(())
    }
}

/// Main configuration for the vault search core.
#[derive(Clone)]
pub struct CoreConfig {
    pub meilisearch: MeilisearchSettings,
    pub sync: SyncSettings,
    pub search: SearchSettings,

    /// HTTP transport used by the search service connector
    pub http_client: Arc<dyn HttpClient>,

    /// Local document collection
    pub document_source: Arc<dyn DocumentSource>,

    /// Storage for the metadata record
    pub blob_store: Arc<dyn BlobStore>,

    /// Time source for `indexedAt` stamps
    pub clock: Arc<dyn Clock>,

    /// Vault directory, when the collection lives on the local file system
    pub vault_root: Option<PathBuf>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("meilisearch", &self.meilisearch)
            .field("sync", &self.sync)
            .field("search", &self.search)
            .field("http_client", &"HttpClient { ... }")
            .field("document_source", &"DocumentSource { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .field("vault_root", &self.vault_root)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.meilisearch.validate()?;
        self.sync.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required. Desktop: enable the 'desktop-shims' feature. \
             Other hosts: {}",
            capability, hint
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "inject the host's fetch API."))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_document_source(
    vault_root: Option<&PathBuf>,
    extensions: &[String],
) -> Result<Arc<dyn DocumentSource>> {
    let root = vault_root.ok_or_else(|| {
        Error::Config(
            "Vault root is required when no DocumentSource is injected. Use .vault_root()."
                .to_string(),
        )
    })?;
    Ok(Arc::new(bridge_desktop::VaultFileSystem::with_extensions(
        root.clone(),
        extensions.to_vec(),
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_document_source(
    _vault_root: Option<&PathBuf>,
    _extensions: &[String],
) -> Result<Arc<dyn DocumentSource>> {
    Err(capability_missing(
        "DocumentSource",
        "inject the editor's vault API.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store() -> Result<Arc<dyn BlobStore>> {
    Ok(Arc::new(bridge_desktop::FileBlobStore::in_data_dir()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store() -> Result<Arc<dyn BlobStore>> {
    Err(capability_missing(
        "BlobStore",
        "inject the plugin data storage API.",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    meilisearch: Option<MeilisearchSettings>,
    sync: Option<SyncSettings>,
    search: Option<SearchSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    document_source: Option<Arc<dyn DocumentSource>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    clock: Option<Arc<dyn Clock>>,
    vault_root: Option<PathBuf>,
}

impl CoreConfigBuilder {
    pub fn meilisearch(mut self, settings: MeilisearchSettings) -> Self {
        self.meilisearch = Some(settings);
        self
    }

    pub fn sync(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn search(mut self, settings: SearchSettings) -> Self {
        self.search = Some(settings);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn document_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.document_source = Some(source);
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn vault_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.vault_root = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let meilisearch = self.meilisearch.ok_or_else(|| {
            Error::Config(
                "Search service settings are required. Use .meilisearch() to set them."
                    .to_string(),
            )
        })?;
        let sync = self.sync.unwrap_or_default();
        let search = self.search.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let document_source = match self.document_source {
            Some(source) => source,
            None => provide_default_document_source(self.vault_root.as_ref(), &sync.extensions)?,
        };

        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store()?,
        };

        let config = CoreConfig {
            meilisearch,
            sync,
            search,
            http_client,
            document_source,
            blob_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            vault_root: self.vault_root,
        };

        config.validate()?;

        Ok(config)
    }
}
