//! # Meilisearch Provider
//!
//! Implements `RemoteIndexClient` and `RemoteSearchClient` for the
//! Meilisearch REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Document upserts, batch deletes and index clears as asynchronous tasks
//! - Task status lookups mapped onto `pending | succeeded | failed`
//! - Index settings updates (searchable and displayed attributes)
//! - Highlighted, cropped search with optional hybrid (semantic) ranking
//! - Health and version checks for connection tests
//!
//! Every response is decoded into the typed structures in [`types`] at this
//! boundary; the rest of the workspace never sees raw JSON from the service.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::MeilisearchConnector;
pub use error::{MeilisearchError, Result};
