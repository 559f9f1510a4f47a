//! metal-api client errors

use thiserror::Error;

/// Errors that can occur when interacting with the metal-api
#[derive(Debug, Error)]
pub enum MetalError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// metal-api returned an error
    #[error("metal-api error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MetalError {
    /// Whether the backend reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetalError::NotFound(_))
    }
}
