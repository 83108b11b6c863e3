//! The catalog: root namespace, registration, and path resolution.

use crate::entity::{Entity, validate_name};
use crate::error::CoreError;
use crate::namespace::Namespace;

/// The single top-level namespace plus the declaration surface.
///
/// All entities live in the tree rooted here and are addressed by dotted
/// path. The catalog holds no build state; that belongs to the session.
#[derive(Debug, Default)]
pub struct Catalog {
    root: Namespace,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level entity, validating its name and every
    /// descendant's name.
    pub fn add(&mut self, entity: impl Into<Entity>) -> Result<(), CoreError> {
        let entity = entity.into();
        validate_tree(&entity)?;
        self.root.add_child(entity);
        Ok(())
    }

    /// Find an entity by dotted path from the root.
    pub fn lookup(&self, path: &str) -> Result<&Entity, CoreError> {
        self.root.lookup(path)
    }

    /// Resolve a name the way a dependency does: first inside the given
    /// namespace, then falling back to the root. Returns the full path the
    /// name resolved to along with the entity.
    pub(crate) fn resolve<'a>(
        &'a self,
        namespace: &str,
        name: &str,
    ) -> Result<(String, &'a Entity), CoreError> {
        if !namespace.is_empty()
            && let Ok(ns) = self.namespace_at(namespace)
            && let Ok(entity) = ns.lookup(name)
        {
            return Ok((join_path(namespace, name), entity));
        }
        let entity = self.root.lookup(name)?;
        Ok((name.to_string(), entity))
    }

    /// The namespace at the given path; the empty path is the root.
    pub(crate) fn namespace_at(&self, path: &str) -> Result<&Namespace, CoreError> {
        if path.is_empty() {
            return Ok(&self.root);
        }
        match self.root.lookup(path)? {
            Entity::Namespace(ns) => Ok(ns),
            entity => Err(CoreError::NotFound(entity.name().to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }
}

fn validate_tree(entity: &Entity) -> Result<(), CoreError> {
    validate_name(entity.name())?;
    if let Entity::Namespace(ns) = entity {
        for (_, child) in ns.children() {
            validate_tree(child)?;
        }
    }
    Ok(())
}

/// Join a namespace path and a relative name into a full path.
pub(crate) fn join_path(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// The namespace portion of a full path; empty for top-level names.
pub(crate) fn parent_path(path: &str) -> &str {
    path.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("")
}

/// The final segment of a path: the entity's own (variable) name.
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
