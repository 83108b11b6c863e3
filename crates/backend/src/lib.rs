//! stencil-backend: Persistence boundary for stencil
//!
//! This crate defines the contract between the build engine and whatever
//! stores the built fixtures:
//! - `Backend`: transaction bracketing and table cleanup
//! - `DeletePolicy`: how `delete_tables` clears data
//! - `NullBackend`: the no-op backend for plain in-memory values

mod backend;
mod error;

pub use backend::{Backend, BackendKind, DeletePolicy, NullBackend};
pub use error::BackendError;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
