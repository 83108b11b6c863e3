//! Session orchestration over a persistence backend.
//!
//! A harness owns the catalog, the session, and the backend, and brackets
//! each build session with a transaction: `setup` before a test case,
//! `teardown` after it. Test-framework integrations are thin wrappers that
//! call these two hooks.

use indexmap::IndexMap;
use tracing::debug;

use stencil_backend::{Backend, BackendKind, DeletePolicy};

use crate::attr::Value;
use crate::build::{self, BuildRequest, DemolishRequest};
use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::session::Session;

/// Owns one catalog and drives build sessions against a backend.
pub struct Harness<B: Backend> {
    catalog: Catalog,
    session: Session,
    backend: B,
    delete_policy: DeletePolicy,
}

impl<B: Backend> Harness<B> {
    pub fn new(catalog: Catalog, backend: B) -> Self {
        Self {
            catalog,
            session: Session::new(),
            backend,
            delete_policy: DeletePolicy::default(),
        }
    }

    /// Use the given policy for `delete_tables`.
    pub fn with_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }
}

impl<B: Backend> std::fmt::Debug for Harness<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness").finish_non_exhaustive()
    }
}

impl Harness<Box<dyn Backend>> {
    /// Build a harness with the backend named in configuration.
    ///
    /// Fails with [`BackendError::UnsupportedBackend`] for names no backend
    /// implementation claims.
    ///
    /// [`BackendError::UnsupportedBackend`]: stencil_backend::BackendError::UnsupportedBackend
    pub fn from_backend_name(catalog: Catalog, name: &str) -> Result<Self, CoreError> {
        let kind: BackendKind = name.parse()?;
        debug!(backend = %kind, "selected backend");
        Ok(Self::new(catalog, kind.create()))
    }
}

impl<B: Backend> Harness<B> {

    /// Begin a session: restore the session baseline and start a backend
    /// transaction.
    pub fn setup(&mut self) -> Result<(), CoreError> {
        debug!("session setup");
        self.session.reset();
        self.backend.start_transaction()?;
        Ok(())
    }

    /// End a session: roll the backend transaction back.
    pub fn teardown(&mut self) -> Result<(), CoreError> {
        debug!("session teardown");
        self.backend.rollback_transaction()?;
        Ok(())
    }

    /// Build the given names once and snapshot the session, so every later
    /// `setup` starts from these fixtures instead of an empty session.
    pub fn prebuild<I, S>(&mut self, names: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests: Vec<BuildRequest> = names.into_iter().map(|name| BuildRequest::new(name)).collect();
        build::build(&self.catalog, &mut self.session, &requests)?;
        self.session.snapshot();
        Ok(())
    }

    /// Build each request in order, returning the last result.
    pub fn build<I>(&mut self, requests: I) -> Result<Value, CoreError>
    where
        I: IntoIterator<Item = BuildRequest>,
    {
        let requests: Vec<BuildRequest> = requests.into_iter().collect();
        build::build(&self.catalog, &mut self.session, &requests)
    }

    /// Build each request, re-executing even already-built entities.
    pub fn build_forced<I>(&mut self, requests: I) -> Result<Value, CoreError>
    where
        I: IntoIterator<Item = BuildRequest>,
    {
        let requests: Vec<BuildRequest> = requests.into_iter().collect();
        build::build_forced(&self.catalog, &mut self.session, &requests)
    }

    /// Run demolish strategies and/or undo executed names.
    pub fn demolish(&mut self, request: &DemolishRequest) -> Result<(), CoreError> {
        build::demolish(&self.catalog, &mut self.session, request)
    }

    /// Normalized attributes for a blueprint, without building it.
    pub fn build_attributes(&self, name: &str) -> Result<IndexMap<String, Value>, CoreError> {
        build::build_attributes(&self.catalog, &self.session, name)
    }

    /// Clear tables through the backend with the configured policy; an empty
    /// slice clears every table.
    pub fn delete_tables(&mut self, tables: &[String]) -> Result<(), CoreError> {
        self.backend.delete_tables(self.delete_policy, tables)?;
        Ok(())
    }

    /// A bound variable from the current session.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.session.var(name)
    }

    /// How many times the named entity actually executed a build.
    pub fn uses(&self, name: &str) -> u32 {
        self.session.uses(name)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
