//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, document
//! source, blob storage, clock) and the Meilisearch connector into the sync
//! core. Desktop apps typically enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`) to get default bridges and a file watcher;
//! other hosts inject their own bridges through
//! [`CoreConfig::builder`](core_runtime::config::CoreConfig::builder).
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MeilisearchSettings};
//! use core_service::VaultSearchService;
//!
//! let config = CoreConfig::builder()
//!     .meilisearch(MeilisearchSettings::new("http://127.0.0.1:7700"))
//!     .vault_root("/home/me/notes")
//!     .build()?;
//! let service = VaultSearchService::new(config)?;
//! service.start()?;
//! ```

pub mod error;
pub mod search;

pub use error::{CoreError, Result};
pub use search::{SearchSession, SearchState};

use std::sync::Arc;

use bridge_traits::{RemoteIndexClient, RemoteSearchClient, ServiceHealth, VaultEvent};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream, NoticeEvent};
use core_sync::{
    BlobMetadataStore, CycleReport, ReconciliationEngine, SyncConfig, SyncHandle, SyncProgress,
    SyncRequest, SyncScheduler,
};
use provider_meilisearch::MeilisearchConnector;
use tokio::sync::{broadcast, watch};
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::VaultWatcher;

const EVENT_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
///
/// Owns the sync worker; every indexing trigger goes through its
/// single-flight queue. Searches go straight to the remote index.
pub struct VaultSearchService {
    config: CoreConfig,
    scheduler: SyncScheduler,
    search: Arc<dyn RemoteSearchClient>,
    events: EventBus,
}

impl VaultSearchService {
    /// Create a service backed by Meilisearch over the configured HTTP client.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let connector = Arc::new(MeilisearchConnector::from_settings(
            config.http_client.clone(),
            &config.meilisearch,
        ));
        Ok(Self::with_clients(config, connector.clone(), connector))
    }

    /// Create a service over explicit remote clients
    pub fn with_clients(
        config: CoreConfig,
        remote: Arc<dyn RemoteIndexClient>,
        search: Arc<dyn RemoteSearchClient>,
    ) -> Self {
        let events = EventBus::new(EVENT_CAPACITY);
        let store = Arc::new(BlobMetadataStore::new(
            config.blob_store.clone(),
            config.sync.metadata_key.clone(),
        ));
        let engine = ReconciliationEngine::new(
            config.document_source.clone(),
            remote,
            store,
            config.clock.clone(),
            SyncConfig::from(&config.sync),
            Some(events.clone()),
        );

        Self {
            scheduler: SyncScheduler::spawn(engine),
            search,
            events,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Queue the startup sync when `auto_sync_on_start` is set
    pub fn start(&self) -> Result<()> {
        if self.config.sync.auto_sync_on_start {
            info!("Queuing startup sync");
            self.scheduler.request(SyncRequest::Incremental)?;
        }
        Ok(())
    }

    /// Run an incremental cycle and wait for it
    pub async fn sync_now(&self) -> Result<CycleReport> {
        Ok(self
            .scheduler
            .request_and_wait(SyncRequest::Incremental)
            .await?)
    }

    /// Clear the remote index and re-submit every document
    pub async fn full_reindex(&self) -> Result<CycleReport> {
        match self
            .scheduler
            .request_and_wait(SyncRequest::FullReindex)
            .await
        {
            Ok(report) => {
                self.notice(
                    EventSeverity::Info,
                    format!("Indexed {} documents", report.stats.added),
                );
                Ok(report)
            }
            Err(e) => {
                self.notice(EventSeverity::Error, format!("Reindex failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Queue a change notification from the host
    pub fn handle_vault_event(&self, event: VaultEvent) -> Result<()> {
        Ok(self.scheduler.request(SyncRequest::Vault(event))?)
    }

    /// Check that the search service is reachable and the key is accepted
    pub async fn test_connection(&self) -> Result<ServiceHealth> {
        match self.search.health().await {
            Ok(health) if health.available => {
                let version = health.version.as_deref().unwrap_or("unknown version");
                self.notice(
                    EventSeverity::Info,
                    format!("Connected to Meilisearch {}", version),
                );
                Ok(health)
            }
            Ok(health) => {
                self.notice(EventSeverity::Warning, "Meilisearch is not available yet");
                Ok(health)
            }
            Err(e) => {
                self.notice(EventSeverity::Error, format!("Connection failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// New debounced search session using the configured search settings
    pub fn search_session(&self) -> SearchSession {
        SearchSession::new(self.search.clone(), self.config.search.clone())
    }

    pub fn progress(&self) -> watch::Receiver<SyncProgress> {
        self.scheduler.progress()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// User-facing notices only, for hosts that render them as toasts
    pub fn notices(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
            .filter(|event| matches!(event, CoreEvent::Notice(_)))
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Cloneable handle for queuing sync requests from other tasks
    pub fn sync_handle(&self) -> SyncHandle {
        self.scheduler.handle()
    }

    /// Watch the configured vault directory and feed changes to the scheduler.
    ///
    /// Notifications stop when the returned watcher is dropped.
    #[cfg(feature = "desktop-shims")]
    pub fn watch_vault(&self) -> Result<VaultWatcher> {
        let root = self.config.vault_root.clone().ok_or_else(|| {
            CoreError::Config("A vault root is required to watch for changes".to_string())
        })?;
        let (watcher, mut changes) = VaultWatcher::start(root, self.config.sync.extensions.clone())?;

        let handle = self.scheduler.handle();
        tokio::spawn(async move {
            while let Some(event) = changes.recv().await {
                if handle.request(SyncRequest::Vault(event)).is_err() {
                    break;
                }
            }
        });
        Ok(watcher)
    }

    /// Stop accepting requests and wait for queued work to finish
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }

    fn notice(&self, severity: EventSeverity, message: impl Into<String>) {
        let notice = NoticeEvent::new(severity, message);
        // No subscribers is fine
        let _ = self.events.emit(CoreEvent::Notice(notice));
    }
}
