//! Integration tests for the service façade
//!
//! A small in-memory search index stands in for Meilisearch: it applies
//! writes, confirms tasks on the first status poll, and answers searches by
//! substring match. This exercises the whole path from a host trigger through
//! the scheduler and engine to searchable results.

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult, BlobStore, BridgeError, DocumentRef, DocumentSource,
    HttpClient, HttpRequest, HttpResponse, RemoteDocument, RemoteIndexClient, RemoteSearchClient,
    SearchHit, SearchQuery, SearchResults, ServiceHealth, TaskHandle, TaskStatus, VaultEvent,
};
use bytes::Bytes;
use core_runtime::config::{CoreConfig, MeilisearchSettings, SyncSettings};
use core_runtime::events::{CoreEvent, EventSeverity};
use core_service::{CoreError, VaultSearchService};
use core_sync::{SyncError, SyncRequest, SyncStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemoryVault {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryVault {
    fn write(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl DocumentSource for MemoryVault {
    async fn list_documents(&self) -> BridgeResult<Vec<DocumentRef>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .map(|p| DocumentRef::new(p.clone()))
            .collect())
    }

    async fn read_document(&self, path: &str) -> BridgeResult<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))
    }
}

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

struct UnusedHttp;

#[async_trait]
impl HttpClient for UnusedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::Network(format!("unexpected request to {}", request.url)))
    }
}

#[derive(Default)]
struct MemoryIndex {
    documents: Mutex<BTreeMap<String, RemoteDocument>>,
    next_uid: Mutex<u64>,
    offline: Mutex<bool>,
}

impl MemoryIndex {
    fn task(&self) -> TaskHandle {
        let mut uid = self.next_uid.lock().unwrap();
        *uid += 1;
        TaskHandle::new(*uid)
    }

    fn ids(&self) -> Vec<String> {
        self.documents.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl RemoteIndexClient for MemoryIndex {
    async fn add_or_update(&self, documents: &[RemoteDocument]) -> BridgeResult<TaskHandle> {
        let mut stored = self.documents.lock().unwrap();
        for doc in documents {
            stored.insert(doc.id.clone(), doc.clone());
        }
        drop(stored);
        Ok(self.task())
    }

    async fn delete(&self, remote_ids: &[String]) -> BridgeResult<TaskHandle> {
        let mut stored = self.documents.lock().unwrap();
        for id in remote_ids {
            stored.remove(id);
        }
        drop(stored);
        Ok(self.task())
    }

    async fn clear(&self) -> BridgeResult<TaskHandle> {
        self.documents.lock().unwrap().clear();
        Ok(self.task())
    }

    async fn status(&self, _handle: &TaskHandle) -> BridgeResult<TaskStatus> {
        Ok(TaskStatus::succeeded())
    }
}

#[async_trait]
impl RemoteSearchClient for MemoryIndex {
    async fn search(&self, query: &SearchQuery) -> BridgeResult<SearchResults> {
        let hits: Vec<SearchHit> = self
            .documents
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.content.contains(&query.query))
            .take(query.limit)
            .map(|d| SearchHit {
                id: d.id.clone(),
                name: d.name.clone(),
                path: d.path.clone(),
                snippet: Some(d.content.clone()),
                highlighted_name: None,
            })
            .collect();
        Ok(SearchResults {
            query: query.query.clone(),
            estimated_total_hits: Some(hits.len() as u64),
            hits,
            processing_time_ms: 0,
        })
    }

    async fn health(&self) -> BridgeResult<ServiceHealth> {
        if *self.offline.lock().unwrap() {
            return Err(BridgeError::Network("connection refused".to_string()));
        }
        Ok(ServiceHealth {
            available: true,
            version: Some("1.8.0".to_string()),
        })
    }
}

struct Fixture {
    vault: Arc<MemoryVault>,
    index: Arc<MemoryIndex>,
    service: VaultSearchService,
}

fn fixture() -> Fixture {
    let vault = Arc::new(MemoryVault::default());
    let index = Arc::new(MemoryIndex::default());
    let config = CoreConfig::builder()
        .meilisearch(MeilisearchSettings::new("http://127.0.0.1:7700"))
        .sync(SyncSettings {
            task_poll_interval: Duration::from_millis(10),
            ..SyncSettings::default()
        })
        .http_client(Arc::new(UnusedHttp))
        .document_source(vault.clone())
        .blob_store(Arc::new(MemoryBlobs::default()))
        .build()
        .unwrap();

    let service = VaultSearchService::with_clients(config, index.clone(), index.clone());
    Fixture {
        vault,
        index,
        service,
    }
}

#[tokio::test(start_paused = true)]
async fn test_startup_sync_indexes_vault() {
    let f = fixture();
    f.vault.write("a.md", "hello");
    f.vault.write("notes/b.md", "---\ntitle: Bee\n---\nbuzz");
    f.vault.write("image.png", "binary");

    f.service.start().unwrap();
    let report = f.service.sync_now().await.unwrap();

    // The queued startup sync and this request ran as one cycle
    assert_eq!(report.stats.added, 2);
    assert_eq!(f.index.ids(), vec!["a_2emd", "notes_2fb_2emd"]);
    assert_eq!(f.service.progress().borrow().status, SyncStatus::Idle);

    let results = f.service.search_session().search_now("buzz").await.unwrap();
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].name, "Bee");

    f.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_vault_events_flow_through_scheduler() {
    let f = fixture();
    f.vault.write("a.md", "hello");
    f.service.sync_now().await.unwrap();

    f.vault.remove("a.md");
    f.vault.write("b.md", "hello");
    let report = f
        .service
        .sync_handle()
        .request_and_wait(SyncRequest::Vault(VaultEvent::Renamed {
            from: "a.md".to_string(),
            to: "b.md".to_string(),
        }))
        .await
        .unwrap();
    assert_eq!(report.stats.added, 1);
    assert_eq!(report.stats.deleted, 1);
    assert_eq!(f.index.ids(), vec!["b_2emd"]);

    f.vault.write("b.md", "hello again");
    f.service
        .handle_vault_event(VaultEvent::Modified {
            path: "b.md".to_string(),
        })
        .unwrap();

    // Queued behind the event, so both are served by one incremental pass
    let report = f.service.sync_now().await.unwrap();
    assert_eq!(report.stats.updated, 1);
    assert_eq!(f.index.ids(), vec!["b_2emd"]);

    f.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_full_reindex_publishes_notice() {
    let f = fixture();
    let mut notices = f.service.notices();
    f.vault.write("a.md", "hello");

    let report = f.service.full_reindex().await.unwrap();
    assert_eq!(report.stats.added, 1);

    // Sync progress events are on the bus too but filtered out here
    let notice = match notices.try_recv() {
        Some(Ok(CoreEvent::Notice(notice))) => notice,
        other => panic!("expected a notice, got {:?}", other),
    };
    assert_eq!(notice.severity, EventSeverity::Info);
    assert_eq!(notice.message, "Indexed 1 documents");
    assert!(notices.try_recv().is_none());

    f.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connection_test_reports_version_or_error() {
    let f = fixture();
    let mut events = f.service.subscribe();

    let health = f.service.test_connection().await.unwrap();
    assert_eq!(health.version.as_deref(), Some("1.8.0"));

    *f.index.offline.lock().unwrap() = true;
    let err = f.service.test_connection().await.unwrap_err();
    assert!(matches!(err, CoreError::Bridge(BridgeError::Network(_))));

    let first = events.try_recv().unwrap();
    assert_eq!(first.severity(), EventSeverity::Info);
    let second = events.try_recv().unwrap();
    assert_eq!(second.severity(), EventSeverity::Error);
    assert!(second.description().contains("connection refused"));

    f.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_metadata_surfaces_as_sync_error() {
    let vault = Arc::new(MemoryVault::default());
    let index = Arc::new(MemoryIndex::default());
    let blobs = Arc::new(MemoryBlobs::default());
    blobs
        .write_blob("index-metadata.json", Bytes::from_static(b"not json"))
        .await
        .unwrap();
    vault.write("a.md", "hello");

    let config = CoreConfig::builder()
        .meilisearch(MeilisearchSettings::new("http://127.0.0.1:7700"))
        .http_client(Arc::new(UnusedHttp))
        .document_source(vault)
        .blob_store(blobs)
        .build()
        .unwrap();
    let service = VaultSearchService::with_clients(config, index.clone(), index.clone());

    let err = service.sync_now().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Sync(SyncError::MetadataCorrupt { .. })
    ));

    service.full_reindex().await.unwrap();
    service.sync_now().await.unwrap();
    assert_eq!(index.ids(), vec!["a_2emd"]);

    service.shutdown().await;
}
