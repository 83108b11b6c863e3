//! Error types for stencil-core

use thiserror::Error;

use stencil_backend::BackendError;

/// Errors that can occur while declaring, building, or demolishing entities
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid entity name {0:?}: names must be non-empty and contain no '.' or whitespace")]
    InvalidName(String),

    #[error("No entity named '{0}' in scope")]
    NotFound(String),

    #[error("Cannot demolish '{0}': it has not been built")]
    NotBuilt(String),

    #[error("Build action for '{name}' failed: {source}")]
    BuildFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
