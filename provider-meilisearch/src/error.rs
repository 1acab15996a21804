//! Error types for the Meilisearch provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Meilisearch provider errors
#[derive(Error, Debug)]
pub enum MeilisearchError {
    /// The service answered with an error document
    #[error("Meilisearch API error (status {status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The service answered with a non-success status and no error document
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Missing or rejected API key
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Meilisearch operations
pub type Result<T> = std::result::Result<T, MeilisearchError>;

impl MeilisearchError {
    /// Decode an error response body, falling back to the raw text
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(error) if status == 401 || status == 403 => {
                MeilisearchError::Unauthorized(error.message)
            }
            Ok(error) => MeilisearchError::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => MeilisearchError::UnexpectedStatus {
                status,
                body: String::from_utf8_lossy(body).chars().take(512).collect(),
            },
        }
    }
}

impl From<MeilisearchError> for BridgeError {
    fn from(error: MeilisearchError) -> Self {
        match error {
            MeilisearchError::Api {
                status,
                code,
                message,
            } => BridgeError::Remote {
                status,
                code: Some(code),
                message,
            },
            MeilisearchError::UnexpectedStatus { status, body } => BridgeError::Remote {
                status,
                code: None,
                message: body,
            },
            MeilisearchError::Unauthorized(message) => BridgeError::Remote {
                status: 401,
                code: Some("invalid_api_key".to_string()),
                message,
            },
            MeilisearchError::Parse(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            MeilisearchError::Bridge(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_document_is_decoded() {
        let body = br#"{"message":"Index `vault` not found.","code":"index_not_found","type":"invalid_request","link":"https://docs.meilisearch.com/errors#index_not_found"}"#;
        let error = MeilisearchError::from_response(404, body);

        assert_eq!(
            error.to_string(),
            "Meilisearch API error (status 404, index_not_found): Index `vault` not found."
        );
    }

    #[test]
    fn test_auth_errors() {
        let body = br#"{"message":"The provided API key is invalid.","code":"invalid_api_key","type":"auth","link":""}"#;
        assert!(matches!(
            MeilisearchError::from_response(403, body),
            MeilisearchError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_error_conversion_keeps_status() {
        let bridge: BridgeError = MeilisearchError::from_response(502, b"Bad Gateway").into();
        assert!(bridge.is_transient());

        let bridge: BridgeError = MeilisearchError::Api {
            status: 400,
            code: "invalid_document_id".to_string(),
            message: "bad id".to_string(),
        }
        .into();
        assert!(matches!(
            bridge,
            BridgeError::Remote { status: 400, code: Some(ref c), .. } if c == "invalid_document_id"
        ));
        assert!(!bridge.is_transient());
    }
}
