//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the synchronization core and the
//! environment it runs in. Each trait represents a capability that the core
//! requires but that is implemented differently per host (desktop directory
//! tree, an editor plugin's vault API, in-memory fakes for tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`RemoteIndexClient`](remote_index::RemoteIndexClient) - Asynchronous task-based index mutations
//! - [`RemoteSearchClient`](remote_index::RemoteSearchClient) - Read-only queries and health checks
//!
//! ### Local collection
//! - [`DocumentSource`](storage::DocumentSource) - Enumerate and read documents
//! - [`BlobStore`](storage::BlobStore) - Atomically replaced small persisted records
//! - [`VaultEvent`](storage::VaultEvent) - Create/modify/delete/rename notifications
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should:
//!
//! - Report transport failures as `BridgeError::Network`
//! - Report service rejections as `BridgeError::Remote`
//! - Report missing documents as `BridgeError::NotFound`
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod remote_index;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use remote_index::{
    IndexSettings, RemoteDocument, RemoteIndexClient, RemoteSearchClient, SearchHit,
    SearchQuery, SearchResults, SemanticQuery, ServiceHealth, TaskHandle, TaskState, TaskStatus,
};
pub use storage::{BlobStore, DocumentRef, DocumentSource, VaultEvent};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, MemoryLogger, SystemClock};
