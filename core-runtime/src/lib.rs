//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the vault search core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Other workspace crates depend on this one for their logging conventions,
//! their slice of [`config::CoreConfig`], and the [`events::EventBus`] they
//! publish progress on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
