//! # Sync Progress State Machine
//!
//! Tracks the lifecycle of reconciliation cycles with validated phase
//! transitions and publishes a [`SyncProgress`] snapshot for the UI.
//!
//! ## Phases
//!
//! ```text
//!         ┌──────────────── full reindex: clear first ───────────────┐
//!         │                                                          ▼
//! Idle → Scanning → Diffing → Submitting ⇄ Waiting → Persisting → Idle
//!           │          │          │           │           │
//!           └──────────┴──────────┴─── Error ─┴───────────┘
//!                                      │
//!                                      └──→ Idle
//! ```
//!
//! The user-facing [`SyncStatus`] is coarser: `idle → indexing → idle`, with
//! `error` kept visible after a failed cycle until the next one starts.
//!
//! Snapshots go out on a `tokio::sync::watch` channel (latest value wins) and,
//! when an [`EventBus`] is attached, as [`SyncEvent`]s.

use core_runtime::events::{CoreEvent, EventBus, SyncEvent, SyncMode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// User-facing indexing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Indexing,
    Error,
}

/// Internal step of the reconciliation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Scanning,
    Diffing,
    Submitting,
    Waiting,
    Persisting,
    Error,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Scanning => "scanning",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Submitting => "submitting",
            SyncPhase::Waiting => "waiting",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Error => "error",
        }
    }

    fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        match (self, next) {
            (Idle, Scanning) | (Idle, Submitting) => true,
            (Scanning, Diffing) => true,
            (Diffing, Submitting) | (Diffing, Persisting) => true,
            (Submitting, Waiting) | (Submitting, Persisting) => true,
            (Waiting, Submitting) | (Waiting, Scanning) | (Waiting, Persisting) => true,
            (Persisting, Idle) => true,
            (Error, Idle) => true,
            (from, Error) => from != Idle && from != Error,
            _ => false,
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of indexing progress. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub status: SyncStatus,
    pub phase: SyncPhase,
    pub total: u64,
    pub processed: u64,
    pub current_item: Option<String>,
    /// Human-readable failure, set only when `status` is `Error`
    pub error: Option<String>,
}

impl SyncProgress {
    pub fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            phase: SyncPhase::Idle,
            total: 0,
            processed: 0,
            current_item: None,
            error: None,
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.processed as f64 / self.total as f64) * 100.0).min(100.0) as u8
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::idle()
    }
}

/// Per-cycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
    /// Documents skipped because they could not be read
    pub failed: u64,
    pub parse_warnings: u64,
}

impl SyncStats {
    pub fn total_changed(&self) -> u64 {
        self.added + self.updated + self.deleted
    }
}

/// Outcome of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub mode: SyncMode,
    pub stats: SyncStats,
    pub duration_ms: u64,
}

struct ActiveCycle {
    id: String,
    mode: SyncMode,
    started: Instant,
}

/// Owns the phase state machine and the progress channel
pub struct ProgressTracker {
    phase: SyncPhase,
    cycle: Option<ActiveCycle>,
    sender: watch::Sender<SyncProgress>,
    events: Option<EventBus>,
}

impl ProgressTracker {
    pub fn new(events: Option<EventBus>) -> Self {
        let (sender, _) = watch::channel(SyncProgress::idle());
        Self {
            phase: SyncPhase::Idle,
            cycle: None,
            sender,
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> SyncProgress {
        self.sender.borrow().clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.events {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Sync(event));
        }
    }

    fn cycle_id(&self) -> String {
        self.cycle
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_default()
    }

    /// Start a new cycle. Fails if one is already running.
    pub fn begin(&mut self, mode: SyncMode) -> Result<String> {
        if self.cycle.is_some() || self.phase != SyncPhase::Idle {
            return Err(SyncError::SyncInProgress);
        }

        let id = Uuid::new_v4().to_string();
        self.cycle = Some(ActiveCycle {
            id: id.clone(),
            mode,
            started: Instant::now(),
        });
        self.sender.send_modify(|p| {
            *p = SyncProgress {
                status: SyncStatus::Indexing,
                ..SyncProgress::idle()
            };
        });

        info!(cycle_id = %id, ?mode, "Sync cycle started");
        self.emit(SyncEvent::Started {
            cycle_id: id.clone(),
            mode,
        });
        Ok(id)
    }

    /// Move to `next`, validating the transition
    pub fn enter(&mut self, next: SyncPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
                reason: "transition not allowed".to_string(),
            });
        }
        debug!(from = %self.phase, to = %next, "Sync phase change");
        self.phase = next;
        self.sender.send_modify(|p| p.phase = next);
        Ok(())
    }

    /// Reset counters for a new unit of work (documents to scan, operations to submit)
    pub fn set_total(&mut self, total: u64) {
        self.sender.send_modify(|p| {
            p.total = total;
            p.processed = 0;
            p.current_item = None;
        });
    }

    /// Record `count` more processed items
    pub fn advance(&mut self, count: u64, current_item: Option<&str>) {
        self.sender.send_modify(|p| {
            p.processed += count;
            p.current_item = current_item.map(str::to_string);
        });

        let snapshot = self.snapshot();
        self.emit(SyncEvent::Progress {
            cycle_id: self.cycle_id(),
            processed: snapshot.processed,
            total: snapshot.total,
            current_item: snapshot.current_item,
            phase: self.phase.to_string(),
        });
    }

    /// Finish a cycle successfully
    pub fn complete(&mut self, stats: SyncStats) -> Result<CycleReport> {
        self.enter(SyncPhase::Idle)?;
        let cycle = self.cycle.take();
        let (cycle_id, mode, duration_ms) = match cycle {
            Some(c) => (c.id, c.mode, c.started.elapsed().as_millis() as u64),
            None => (String::new(), SyncMode::Incremental, 0),
        };

        self.sender.send_modify(|p| *p = SyncProgress::idle());
        info!(
            cycle_id = %cycle_id,
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            duration_ms,
            "Sync cycle completed"
        );
        self.emit(SyncEvent::Completed {
            cycle_id: cycle_id.clone(),
            added: stats.added,
            updated: stats.updated,
            deleted: stats.deleted,
            unchanged: stats.unchanged,
            parse_warnings: stats.parse_warnings,
            duration_ms,
        });

        Ok(CycleReport {
            cycle_id,
            mode,
            stats,
            duration_ms,
        })
    }

    /// Report a failed cycle and return to idle.
    ///
    /// Callable from any phase, including right after [`begin`](Self::begin)
    /// when a request is refused before any work starts.
    pub fn fail(&mut self, error: &SyncError) {
        if self.phase != SyncPhase::Idle && self.phase != SyncPhase::Error {
            self.phase = SyncPhase::Error;
        }
        let cycle_id = self.cycle.take().map(|c| c.id).unwrap_or_default();
        let message = error.to_string();

        self.sender.send_modify(|p| {
            p.status = SyncStatus::Error;
            p.phase = SyncPhase::Error;
            p.error = Some(message.clone());
        });
        warn!(cycle_id = %cycle_id, error = %message, "Sync cycle failed");
        self.emit(SyncEvent::Failed {
            cycle_id,
            message,
            processed: self.snapshot().processed,
            recoverable: error.is_recoverable(),
        });

        // Error is terminal for the run only; the engine is ready for the next request
        self.phase = SyncPhase::Idle;
    }
}
