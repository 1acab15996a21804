//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `DocumentSource` over a vault directory using `tokio::fs`
//! - `BlobStore` as atomically replaced files in the platform data directory
//! - Vault change notifications using `notify`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileBlobStore, ReqwestHttpClient, VaultFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let vault = VaultFileSystem::new("/home/me/notes");
//!     let blobs = FileBlobStore::in_data_dir();
//!
//!     // Use in core configuration
//! }
//! ```

mod blob_store;
mod filesystem;
mod http;
mod watcher;

pub use blob_store::FileBlobStore;
pub use filesystem::VaultFileSystem;
pub use http::ReqwestHttpClient;
pub use watcher::VaultWatcher;
