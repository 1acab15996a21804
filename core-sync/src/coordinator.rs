//! # Reconciliation Engine
//!
//! Brings the remote index in line with the local document collection.
//!
//! ## Overview
//!
//! The `ReconciliationEngine` owns the in-memory [`Metadata`] mapping and is
//! the only component that mutates it. Each cycle:
//!
//! 1. Enumerates the collection (or the requested paths) and fingerprints
//!    every document
//! 2. Classifies paths against the last confirmed metadata
//! 3. Parses only the added and modified documents
//! 4. Submits deletions, then additions, then modifications in batches of
//!    `batch_size`, confirming each remote task before the next starts
//! 5. Updates the mapping per confirmed batch and persists it once at the end
//!
//! A failed batch stops the cycle. Batches confirmed before it stay committed
//! and are persisted; later batches are never attempted.
//!
//! ## Modes
//!
//! - **Incremental**: the whole collection against the loaded metadata
//! - **Full reindex**: optional index settings push, `clear()`, then every
//!   document is treated as added. A failed clear leaves the metadata untouched.
//! - **Paths**: the real-time variant restricted to the given paths
//!
//! Methods take `&mut self`, so a single engine can never run two cycles at
//! once. [`SyncScheduler`](crate::scheduler::SyncScheduler) owns the engine in
//! its worker task and serializes requests onto it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ReconciliationEngine, SyncConfig};
//!
//! # async fn example(mut engine: ReconciliationEngine) -> core_sync::Result<()> {
//! let report = engine.run_incremental().await?;
//! println!("{} documents changed", report.stats.total_changed());
//! # Ok(())
//! # }
//! ```

use bridge_traits::{
    BridgeError, Clock, DocumentSource, IndexSettings, RemoteDocument, RemoteIndexClient,
    TaskHandle,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{EventBus, SyncMode};
use core_runtime::logging::log_path;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::diff::{diff, ChangeSet, Scope};
use crate::document::{self, Document};
use crate::error::{Result, SyncError};
use crate::metadata::{Metadata, MetadataEntry, MetadataStore};
use crate::progress::{CycleReport, ProgressTracker, SyncPhase, SyncProgress, SyncStats};
use crate::task_waiter::TaskWaiter;

/// Engine tuning, derived from [`SyncSettings`]
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum documents per remote task
    pub batch_size: usize,

    pub task_poll_interval: Duration,

    pub task_max_attempts: u32,

    /// Lowercase extensions (without dot) that are indexed
    pub extensions: Vec<String>,

    /// Push searchable/displayed attributes before a full reindex
    pub push_index_settings: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            task_poll_interval: settings.task_poll_interval,
            task_max_attempts: settings.task_max_attempts,
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            push_index_settings: true,
        }
    }
}

impl SyncConfig {
    fn is_indexable(&self, path: &str) -> bool {
        bridge_traits::storage::extension_of(path)
            .map(|ext| self.extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }
}

/// Fingerprints gathered during the scanning phase
#[derive(Default)]
struct Scan {
    hashes: BTreeMap<String, String>,
    /// Text of documents whose fingerprint differs from the metadata
    changed: HashMap<String, String>,
    /// Paths that exist but could not be read this cycle
    unreadable: BTreeSet<String>,
}

/// Remote mutations submitted by the engine
enum RemoteOp<'a> {
    Delete(&'a [String]),
    Upsert(&'a [RemoteDocument]),
    Clear,
}

pub struct ReconciliationEngine {
    source: Arc<dyn DocumentSource>,
    remote: Arc<dyn RemoteIndexClient>,
    store: Arc<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
    waiter: TaskWaiter,
    config: SyncConfig,
    metadata: Metadata,
    loaded: bool,
    /// Mapping differs from the persisted record
    dirty: bool,
    /// Set when the persisted record could not be decoded
    corrupt: Option<String>,
    progress: ProgressTracker,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        remote: Arc<dyn RemoteIndexClient>,
        store: Arc<dyn MetadataStore>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
        events: Option<EventBus>,
    ) -> Self {
        let waiter = TaskWaiter::new(
            remote.clone(),
            config.task_poll_interval,
            config.task_max_attempts,
        );
        Self {
            source,
            remote,
            store,
            clock,
            waiter,
            config,
            metadata: Metadata::new(),
            loaded: false,
            dirty: false,
            corrupt: None,
            progress: ProgressTracker::new(events),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribe to progress snapshots
    pub fn progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.subscribe()
    }

    /// Last confirmed mapping held in memory
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// True while incremental cycles are refused until a full reindex succeeds
    pub fn requires_full_reindex(&self) -> bool {
        self.corrupt.is_some()
    }

    /// Load the persisted metadata if not loaded yet.
    ///
    /// Returns the number of known documents.
    ///
    /// # Errors
    ///
    /// `SyncError::MetadataCorrupt` if the record cannot be decoded; every
    /// later incremental or path request fails the same way until
    /// [`run_full_reindex`](Self::run_full_reindex) succeeds.
    pub async fn load_metadata(&mut self) -> Result<usize> {
        if let Some(reason) = &self.corrupt {
            return Err(SyncError::MetadataCorrupt {
                reason: reason.clone(),
            });
        }
        if self.loaded {
            return Ok(self.metadata.len());
        }

        match self.store.load().await {
            Ok(metadata) => {
                self.metadata = metadata;
                self.loaded = true;
                info!(documents = self.metadata.len(), "Index metadata loaded");
                Ok(self.metadata.len())
            }
            Err(SyncError::MetadataCorrupt { reason }) => {
                warn!(%reason, "Index metadata is corrupt, full reindex required");
                self.corrupt = Some(reason.clone());
                Err(SyncError::MetadataCorrupt { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Reconcile the whole collection against the last confirmed state
    #[instrument(skip(self))]
    pub async fn run_incremental(&mut self) -> Result<CycleReport> {
        self.progress.begin(SyncMode::Incremental)?;
        let outcome = self.incremental_cycle().await;
        self.finish(outcome)
    }

    /// Clear the remote index and submit every document
    #[instrument(skip(self))]
    pub async fn run_full_reindex(&mut self) -> Result<CycleReport> {
        self.progress.begin(SyncMode::Full)?;
        let outcome = self.full_cycle().await;
        self.finish(outcome)
    }

    /// Reconcile only `paths`.
    ///
    /// A path that no longer exists is deleted from the index if it was
    /// known; paths with a non-indexed extension are treated as absent.
    #[instrument(skip(self, paths), fields(paths = paths.len()))]
    pub async fn run_paths(&mut self, paths: &BTreeSet<String>) -> Result<CycleReport> {
        self.progress.begin(SyncMode::Paths)?;
        let outcome = self.paths_cycle(paths).await;
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: Result<SyncStats>) -> Result<CycleReport> {
        match outcome {
            Ok(stats) => self.progress.complete(stats),
            Err(e) => {
                self.progress.fail(&e);
                Err(e)
            }
        }
    }

    async fn incremental_cycle(&mut self) -> Result<SyncStats> {
        self.load_metadata().await?;

        self.progress.enter(SyncPhase::Scanning)?;
        let paths = self.list_indexable().await?;
        let (scan, failed) = scan(
            self.source.as_ref(),
            &paths,
            &self.metadata,
            &mut self.progress,
        )
        .await;

        self.progress.enter(SyncPhase::Diffing)?;
        let changes = diff(&self.metadata, &scan.hashes, Scope::All);
        self.apply(changes, scan, failed).await
    }

    async fn full_cycle(&mut self) -> Result<SyncStats> {
        if self.config.push_index_settings {
            self.push_index_settings().await?;
        }

        self.submit(RemoteOp::Clear).await?;
        info!(
            previous = self.metadata.len(),
            "Remote index cleared, resetting metadata"
        );
        self.metadata = Metadata::new();
        self.loaded = true;
        self.dirty = true;
        // The remote index is empty now; the record must not outlive it
        self.persist().await?;

        self.progress.enter(SyncPhase::Scanning)?;
        let paths = self.list_indexable().await?;
        let (scan, failed) = scan(
            self.source.as_ref(),
            &paths,
            &self.metadata,
            &mut self.progress,
        )
        .await;

        self.progress.enter(SyncPhase::Diffing)?;
        let changes = diff(&self.metadata, &scan.hashes, Scope::All);
        self.apply(changes, scan, failed).await
    }

    async fn paths_cycle(&mut self, requested: &BTreeSet<String>) -> Result<SyncStats> {
        self.load_metadata().await?;

        self.progress.enter(SyncPhase::Scanning)?;
        let paths: Vec<String> = requested
            .iter()
            .filter(|p| self.config.is_indexable(p))
            .cloned()
            .collect();
        let (scan, failed) = scan(
            self.source.as_ref(),
            &paths,
            &self.metadata,
            &mut self.progress,
        )
        .await;

        self.progress.enter(SyncPhase::Diffing)?;
        let changes = diff(&self.metadata, &scan.hashes, Scope::Paths(requested));
        self.apply(changes, scan, failed).await
    }

    async fn list_indexable(&self) -> Result<Vec<String>> {
        let documents = self.source.list_documents().await?;
        let total = documents.len();
        let paths: Vec<String> = documents
            .into_iter()
            .map(|d| d.path)
            .filter(|p| self.config.is_indexable(p))
            .collect();
        debug!(total, indexable = paths.len(), "Enumerated collection");
        Ok(paths)
    }

    /// Best effort: an index that rejects settings can still hold documents
    async fn push_index_settings(&mut self) -> Result<()> {
        self.progress.enter(SyncPhase::Submitting)?;
        let handle = match self.remote.update_settings(&IndexSettings::default()).await {
            Ok(handle) => handle,
            Err(BridgeError::NotAvailable(_)) => {
                debug!("Remote index does not support settings updates");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Failed to push index settings");
                return Ok(());
            }
        };

        self.progress.enter(SyncPhase::Waiting)?;
        if let Err(e) = self.waiter.wait(&handle).await {
            warn!(error = %e, "Index settings task did not succeed");
        }
        Ok(())
    }

    /// Submit one mutation and wait for its task to succeed
    async fn submit(&mut self, op: RemoteOp<'_>) -> Result<TaskHandle> {
        if self.progress.phase() != SyncPhase::Submitting {
            self.progress.enter(SyncPhase::Submitting)?;
        }

        let handle = match op {
            RemoteOp::Delete(ids) => self.remote.delete(ids).await?,
            RemoteOp::Upsert(documents) => self.remote.add_or_update(documents).await?,
            RemoteOp::Clear => self.remote.clear().await?,
        };
        debug!(task = %handle, "Remote task enqueued");

        self.progress.enter(SyncPhase::Waiting)?;
        self.waiter.wait(&handle).await?;
        Ok(handle)
    }

    /// Submit `changes`, then persist whatever was confirmed
    async fn apply(&mut self, changes: ChangeSet, mut scan: Scan, failed: u64) -> Result<SyncStats> {
        let mut stats = SyncStats {
            unchanged: changes.unchanged.len() as u64,
            failed,
            ..SyncStats::default()
        };

        // A document that exists but failed to read is not a deletion
        let deleted: Vec<MetadataEntry> = changes
            .deleted
            .into_iter()
            .filter(|e| !scan.unreadable.contains(&e.path))
            .collect();

        let added = parse_changed(&changes.added, &mut scan.changed, &mut stats);
        let modified = parse_changed(&changes.modified, &mut scan.changed, &mut stats);

        let pending = deleted.len() + added.len() + modified.len();
        if pending == 0 {
            self.progress.enter(SyncPhase::Persisting)?;
            self.persist().await?;
            debug!(unchanged = stats.unchanged, "Nothing to submit");
            return Ok(stats);
        }

        self.progress.enter(SyncPhase::Submitting)?;
        self.progress.set_total(pending as u64);
        let submitted = self.submit_all(&deleted, &added, &modified, &mut stats).await;

        self.progress.enter(SyncPhase::Persisting)?;
        let persisted = self.persist().await;

        match (submitted, persisted) {
            (Err(e), Err(persist_error)) => {
                warn!(error = %persist_error, "Metadata not persisted after failed batch");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(stats),
        }
    }

    /// Deletions, then additions, then modifications; stops at the first failure
    async fn submit_all(
        &mut self,
        deleted: &[MetadataEntry],
        added: &[Document],
        modified: &[Document],
        stats: &mut SyncStats,
    ) -> Result<()> {
        let batch_size = self.config.batch_size;

        for chunk in deleted.chunks(batch_size) {
            let ids: Vec<String> = chunk.iter().map(|e| e.remote_id.clone()).collect();
            self.submit(RemoteOp::Delete(&ids)).await?;

            for entry in chunk {
                self.metadata.remove(&entry.path);
            }
            self.dirty = true;
            stats.deleted += chunk.len() as u64;
            self.progress
                .advance(chunk.len() as u64, chunk.last().map(|e| e.path.as_str()));
            debug!(count = chunk.len(), "Deletion batch confirmed");
        }

        for chunk in added.chunks(batch_size) {
            self.upsert_batch(chunk).await?;
            stats.added += chunk.len() as u64;
        }

        for chunk in modified.chunks(batch_size) {
            self.upsert_batch(chunk).await?;
            stats.updated += chunk.len() as u64;
        }

        Ok(())
    }

    async fn upsert_batch(&mut self, chunk: &[Document]) -> Result<()> {
        let payload: Vec<RemoteDocument> = chunk.iter().map(Document::to_remote).collect();
        self.submit(RemoteOp::Upsert(&payload)).await?;

        let indexed_at = self.clock.unix_timestamp_millis();
        for doc in chunk {
            self.metadata.upsert(MetadataEntry {
                path: doc.path.clone(),
                hash: doc.hash.clone(),
                remote_id: doc.id.clone(),
                indexed_at,
            });
        }
        self.dirty = true;
        self.progress
            .advance(chunk.len() as u64, chunk.last().map(|d| d.path.as_str()));
        debug!(count = chunk.len(), "Upsert batch confirmed");
        Ok(())
    }

    async fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.metadata).await?;
        self.dirty = false;
        if self.corrupt.take().is_some() {
            info!("Corrupt metadata replaced");
        }
        Ok(())
    }
}

/// Parse the documents read during the scan; warnings are counted, never fatal
fn parse_changed(
    paths: &[String],
    contents: &mut HashMap<String, String>,
    stats: &mut SyncStats,
) -> Vec<Document> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(raw) = contents.remove(path) else {
            continue;
        };
        let parsed = document::parse(path, &raw);
        if let Some(warning) = parsed.warning {
            stats.parse_warnings += 1;
            warn!(path = %log_path(&warning.path), message = %warning.message, "Frontmatter ignored");
        }
        documents.push(parsed.document);
    }
    documents
}

/// Read and fingerprint `paths`.
///
/// Returns the scan and the number of documents that could not be read.
/// Missing documents are simply absent from the result.
async fn scan(
    source: &dyn DocumentSource,
    paths: &[String],
    known: &Metadata,
    progress: &mut ProgressTracker,
) -> (Scan, u64) {
    let mut result = Scan::default();
    let mut failed = 0;
    progress.set_total(paths.len() as u64);

    for path in paths {
        match source.read_document(path).await {
            Ok(raw) => {
                let hash = crate::hasher::content_hash(raw.as_bytes());
                let changed = known.get(path).map(|e| e.hash != hash).unwrap_or(true);
                if changed {
                    result.changed.insert(path.clone(), raw);
                }
                result.hashes.insert(path.clone(), hash);
            }
            Err(BridgeError::NotFound(_)) => {
                debug!(path = %log_path(path), "Document vanished during scan");
            }
            Err(e) => {
                warn!(path = %log_path(path), error = %e, "Skipping unreadable document");
                failed += 1;
                result.unreadable.insert(path.clone());
            }
        }
        progress.advance(1, Some(path.as_str()));
    }

    (result, failed)
}
