use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Transport-level failure (connection refused, DNS, timeout).
    ///
    /// Callers treat this as transient: the remote side may never have seen
    /// the request.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service answered and rejected the request.
    #[error("Remote service error (status {status}): {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure may succeed if the same call is repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Network(_) => true,
            BridgeError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
