//! Attribute values: concrete values and deferred computations.
//!
//! Declared attributes and call-time options map names to either a plain
//! value or a deferred closure evaluated against the session at build time.
//! Deferral lets one blueprint's attribute reference another blueprint's
//! result that only exists once that other blueprint has been built.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::session::Session;

/// The opaque value type bound into the variable context.
pub type Value = serde_json::Value;

/// A deferred attribute computation, run against the current session.
pub type LazyFn = dyn Fn(&Session) -> Value + Send + Sync;

/// An attribute value: concrete, or deferred until build time.
#[derive(Clone)]
pub enum Attr {
    Value(Value),
    Lazy(Arc<LazyFn>),
}

impl Attr {
    /// Create a concrete attribute value.
    pub fn value(value: impl Into<Value>) -> Self {
        Attr::Value(value.into())
    }

    /// Create a deferred attribute, evaluated against the session at build time.
    pub fn lazy(f: impl Fn(&Session) -> Value + Send + Sync + 'static) -> Self {
        Attr::Lazy(Arc::new(f))
    }

    /// Resolve to a concrete value.
    pub fn resolve(&self, session: &Session) -> Value {
        match self {
            Attr::Value(value) => value.clone(),
            Attr::Lazy(f) => f(session),
        }
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Attr::Lazy(_) => f.debug_tuple("Lazy").field(&"<deferred>").finish(),
        }
    }
}

/// An ordered attribute or option mapping, as declared.
pub type Attrs = IndexMap<String, Attr>;

/// Resolve every attribute to a concrete value, preserving order.
pub fn normalize(attrs: &Attrs, session: &Session) -> IndexMap<String, Value> {
    attrs
        .iter()
        .map(|(name, attr)| (name.clone(), attr.resolve(session)))
        .collect()
}
