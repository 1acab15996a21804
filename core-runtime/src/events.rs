//! # Event Bus System
//!
//! Decoupled notifications from the sync core to the host UI using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`] for reconciliation cycles, [`NoticeEvent`]
//!   for user-facing messages the host renders as toasts
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ```text
//! ┌─────────────────┐   emit   ┌───────────┐   subscribe   ┌────────────┐
//! │ SyncScheduler   ├─────────>│ EventBus  ├──────────────>│ Status bar │
//! └─────────────────┘          │ (broadcast│               └────────────┘
//! ┌─────────────────┐   emit   │  channel) │   subscribe   ┌────────────┐
//! │ VaultSearch svc ├─────────>│           ├──────────────>│ Toasts     │
//! └─────────────────┘          └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, NoticeEvent, EventSeverity};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Notice(NoticeEvent::new(
//!     EventSeverity::Info,
//!     "Connected to search service",
//! )))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Notice(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Publishers ignore `SendError` (no subscribers is a normal state).

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Notice(NoticeEvent),
}

impl CoreEvent {
    /// Returns a short human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Notice(e) => &e.message,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(_) => EventSeverity::Debug,
            CoreEvent::Notice(notice) => notice.severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Which kind of reconciliation a cycle performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Incremental,
    Full,
    /// Restricted to the paths named by vault events
    Paths,
}

/// Reconciliation cycle lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        cycle_id: String,
        mode: SyncMode,
    },
    /// Emitted as documents are processed.
    Progress {
        cycle_id: String,
        processed: u64,
        total: u64,
        current_item: Option<String>,
        phase: String,
    },
    Completed {
        cycle_id: String,
        added: u64,
        updated: u64,
        deleted: u64,
        unchanged: u64,
        parse_warnings: u64,
        duration_ms: u64,
    },
    /// The cycle stopped early. Batches confirmed before the failure stay committed.
    Failed {
        cycle_id: String,
        message: String,
        processed: u64,
        /// False when a full reindex is required (corrupt metadata)
        recoverable: bool,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Indexing started",
            SyncEvent::Progress { .. } => "Indexing in progress",
            SyncEvent::Completed { .. } => "Indexing completed",
            SyncEvent::Failed { .. } => "Indexing failed",
        }
    }

    pub fn cycle_id(&self) -> &str {
        match self {
            SyncEvent::Started { cycle_id, .. }
            | SyncEvent::Progress { cycle_id, .. }
            | SyncEvent::Completed { cycle_id, .. }
            | SyncEvent::Failed { cycle_id, .. } => cycle_id,
        }
    }
}

/// A message meant for the user (toast/notice), not for logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoticeEvent {
    pub severity: EventSeverity,
    pub message: String,
}

impl NoticeEvent {
    pub fn new(severity: EventSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or `SendError`
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Filtered view over a bus subscription.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let sync_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Started {
            cycle_id: id.to_string(),
            mode: SyncMode::Incremental,
        })
    }

    fn notice(message: &str) -> CoreEvent {
        CoreEvent::Notice(NoticeEvent::new(EventSeverity::Warning, message))
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("c1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(started("c1")).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), started("c1"));
        assert_eq!(sub2.recv().await.unwrap(), started("c1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Notice(_)));

        bus.emit(started("c1")).unwrap();
        bus.emit(notice("metadata unreadable")).unwrap();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, notice("metadata unreadable"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&format!("c{}", i))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            cycle_id: "c1".to_string(),
            message: "task#3 failed".to_string(),
            processed: 1,
            recoverable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(started("c1").severity(), EventSeverity::Debug);
        assert_eq!(notice("x").severity(), EventSeverity::Warning);
        assert_eq!(notice("reindex required").description(), "reindex required");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::Progress {
            cycle_id: "c1".to_string(),
            processed: 3,
            total: 10,
            current_item: Some("notes/a.md".to_string()),
            phase: "submitting".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "Progress");
        assert_eq!(json["payload"]["current_item"], "notes/a.md");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_cycle_id_accessor() {
        if let CoreEvent::Sync(sync) = started("abc") {
            assert_eq!(sync.cycle_id(), "abc");
        }
    }
}
