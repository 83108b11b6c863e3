//! The build context: explicit state for one strategy or action invocation.
//!
//! Each strategy call receives a fresh context carrying the merged call-time
//! options, the full normalized attribute set, and the variable name the
//! result will be bound under. Nested builds triggered from inside a strategy
//! construct their own contexts, so an inner build never sees (or clobbers)
//! the caller's options.

use indexmap::IndexMap;

use crate::attr::{Attr, Attrs, Value};
use crate::build::{self, BuildRequest};
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::session::Session;

/// Ambient state for one build action or strategy invocation.
pub struct BuildContext<'a> {
    catalog: &'a Catalog,
    session: &'a mut Session,
    namespace: String,
    variable_name: String,
    options: IndexMap<String, Value>,
    attributes: IndexMap<String, Value>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        session: &'a mut Session,
        namespace: String,
        variable_name: String,
        options: IndexMap<String, Value>,
        attributes: IndexMap<String, Value>,
    ) -> Self {
        Self {
            catalog,
            session,
            namespace,
            variable_name,
            options,
            attributes,
        }
    }

    /// Normalized call-time options for this invocation.
    pub fn options(&self) -> &IndexMap<String, Value> {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Full normalized attribute set: declared attributes merged with
    /// call-time options, deferred values evaluated.
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// The name this invocation's result will be bound under.
    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Look up any bound variable in the session.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.session.var(name)
    }

    /// Bind a variable in the session.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.session.set_var(name, value);
    }

    /// The value currently bound under this invocation's variable name.
    pub fn bound_value(&self) -> Option<&Value> {
        self.session.var(&self.variable_name)
    }

    pub fn session(&self) -> &Session {
        self.session
    }

    /// Build another entity, resolved like a dependency of the entity this
    /// context belongs to (own namespace first, root fallback).
    pub fn build(&mut self, name: &str) -> Result<Value, CoreError> {
        build::build_in(self.catalog, self.session, &self.namespace, &BuildRequest::new(name), false)
    }

    /// Build another entity with call-time options, binding its result under
    /// `alias` instead of its own name.
    pub fn build_aliased(
        &mut self,
        name: &str,
        alias: &str,
        options: IndexMap<String, Value>,
    ) -> Result<Value, CoreError> {
        let options: Attrs = options
            .into_iter()
            .map(|(key, value)| (key, Attr::Value(value)))
            .collect();
        let request = BuildRequest::new(name).with_alias(alias).with_options(options);
        build::build_in(self.catalog, self.session, &self.namespace, &request, false)
    }
}
