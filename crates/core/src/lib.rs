//! stencil-core: Named-entity dependency resolution and memoized building
//!
//! This crate provides the fundamental types of stencil:
//! - `Plan`: a memoized leaf build action bound to a name
//! - `Blueprint`: a plan with named strategies, declared attributes, and extension
//! - `Namespace`: a composite grouping of entities under dotted-path names
//! - `Catalog`: the root namespace and declaration surface
//! - `Session`: the per-session variable context and executed-name registry
//! - `Harness`: session orchestration over a persistence backend
//!
//! Building a name resolves it through its namespace (falling back to the
//! root), satisfies its declared dependencies depth-first, then runs its own
//! build action unless a previous build in the same session already did.

pub mod attr;
pub mod blueprint;
pub mod build;
pub mod catalog;
pub mod context;
pub mod entity;
pub mod error;
pub mod harness;
pub mod namespace;
pub mod plan;
pub mod session;

pub use attr::{Attr, Attrs, Value};
pub use blueprint::{Blueprint, DEFAULT_STRATEGY, DEMOLISH_STRATEGY, UPDATE_STRATEGY};
pub use build::{BuildRequest, DemolishRequest, Undo, build, build_attributes, build_forced, demolish};
pub use catalog::Catalog;
pub use context::BuildContext;
pub use entity::Entity;
pub use error::CoreError;
pub use harness::Harness;
pub use namespace::Namespace;
pub use plan::Plan;
pub use session::Session;

// Re-export the backend contract for convenience
pub use stencil_backend::{Backend, BackendError, BackendKind, DeletePolicy, NullBackend};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
