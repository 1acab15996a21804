//! # Sync & Indexing Module
//!
//! Keeps a remote full-text index in line with a local document collection.
//!
//! ## Overview
//!
//! This module detects what changed since the last confirmed sync and pushes
//! only those changes to the remote index:
//! - Fingerprinting document contents (`hasher`)
//! - Parsing frontmatter and deriving stable document ids (`document`)
//! - Persisting what the remote index is known to hold (`metadata`)
//! - Classifying paths as added, modified, deleted or unchanged (`diff`)
//! - Confirming asynchronous remote tasks (`task_waiter`)
//!
//! ## Components
//!
//! - **Reconciliation Engine** (`coordinator`): Runs incremental, full and per-path cycles
//! - **Sync Scheduler** (`scheduler`): Single-flight queue that coalesces triggers
//! - **Progress** (`progress`): Phase state machine and UI snapshots
//! - **Metadata Store** (`metadata`): Durable `path -> {hash, remoteId, indexedAt}` record

pub mod coordinator;
pub mod diff;
pub mod document;
pub mod error;
pub mod hasher;
pub mod metadata;
pub mod progress;
pub mod scheduler;
pub mod task_waiter;

pub use coordinator::{ReconciliationEngine, SyncConfig};
pub use diff::{diff, ChangeSet, Scope};
pub use document::{document_id, parse, Document, ParseWarning, ParsedDocument};
pub use error::{Result, SyncError};
pub use hasher::content_hash;
pub use metadata::{BlobMetadataStore, Metadata, MetadataEntry, MetadataStore};
pub use progress::{CycleReport, ProgressTracker, SyncPhase, SyncProgress, SyncStats, SyncStatus};
pub use scheduler::{SyncHandle, SyncRequest, SyncScheduler};
pub use task_waiter::TaskWaiter;
