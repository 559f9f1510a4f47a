//! CRD helper errors

use thiserror::Error;

/// Errors raised while deriving objects from a custom resource.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrdError {
    #[error("resource has no name")]
    MissingName,

    #[error("resource {0} has no namespace")]
    MissingNamespace(String),

    #[error("resource {0} has no uid, it has not been persisted yet")]
    MissingUid(String),
}
