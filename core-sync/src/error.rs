use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors raised by the reconciliation core.
///
/// Every variant owns plain data so a single cycle outcome can be handed to
/// every caller whose request was coalesced into that cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or connection failure on a single remote call
    #[error("Search service unreachable: {0}")]
    TransientRemote(String),

    /// The remote service reported failure for a submitted task
    #[error("Remote task {task_uid} failed: {message}")]
    TaskFailed { task_uid: u64, message: String },

    /// Polling budget exhausted; the task's real outcome is unknown
    #[error("Remote task {task_uid} did not finish after {attempts} status checks")]
    TaskTimeout { task_uid: u64, attempts: u32 },

    #[error("Index metadata is unreadable ({reason}); a full reindex is required")]
    MetadataCorrupt { reason: String },

    #[error("A sync cycle is already in progress")]
    SyncInProgress,

    #[error("Failed to persist index metadata: {0}")]
    Persistence(String),

    #[error("Failed to read document {path}: {message}")]
    DocumentRead { path: String, message: String },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Non-transient failure reported by a host bridge or the remote service
    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Sync worker stopped")]
    WorkerStopped,
}

impl SyncError {
    /// Whether a later incremental cycle can succeed without a full reindex
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::MetadataCorrupt { .. })
    }
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        if error.is_transient() {
            SyncError::TransientRemote(error.to_string())
        } else {
            SyncError::Bridge(error.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_classification() {
        let transient: SyncError = BridgeError::Network("connection refused".to_string()).into();
        assert!(matches!(transient, SyncError::TransientRemote(_)));

        let rejected: SyncError = BridgeError::Remote {
            status: 400,
            code: Some("invalid_document_id".to_string()),
            message: "bad id".to_string(),
        }
        .into();
        assert!(matches!(rejected, SyncError::Bridge(_)));
    }

    #[test]
    fn test_only_corruption_needs_reindex() {
        assert!(!SyncError::MetadataCorrupt {
            reason: "eof".to_string()
        }
        .is_recoverable());
        assert!(SyncError::TaskTimeout {
            task_uid: 1,
            attempts: 20
        }
        .is_recoverable());
    }
}
