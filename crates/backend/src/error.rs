//! Error types for stencil-backend

use thiserror::Error;

/// Errors that can occur at the persistence boundary
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unsupported delete policy '{0}', expected 'delete' or 'truncate'")]
    UnsupportedPolicy(String),

    #[error("Unsupported backend '{0}'")]
    UnsupportedBackend(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}
