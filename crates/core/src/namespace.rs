//! Namespaces: composite entities grouping children under dotted paths.

use indexmap::IndexMap;

use crate::entity::Entity;
use crate::error::CoreError;

/// A composite entity holding a mapping of child name to entity.
///
/// Children keep insertion order; a namespace may contain plans, blueprints,
/// and nested namespaces. Building a namespace builds every child in order
/// and binds the deduplicated list of their results under the namespace's
/// own name.
#[derive(Debug, Default)]
pub struct Namespace {
    name: String,
    dependencies: Vec<String>,
    children: IndexMap<String, Entity>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            children: IndexMap::new(),
        }
    }

    /// Declare dependencies built before any entity in this namespace.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Add a child, chaining. Redeclaring a name replaces the previous child.
    pub fn child(mut self, entity: impl Into<Entity>) -> Self {
        self.add_child(entity.into());
        self
    }

    /// Register a child under its own name.
    pub fn add_child(&mut self, entity: Entity) {
        self.children.insert(entity.name().to_string(), entity);
    }

    /// Find a descendant by relative dotted path.
    ///
    /// The path is split on the first separator; the head segment resolves
    /// against `children` and the rest recurses into that child. A missing
    /// segment, or a path continuing past a non-namespace leaf, is `NotFound`
    /// carrying the offending segment.
    pub fn lookup(&self, path: &str) -> Result<&Entity, CoreError> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let child = self
            .children
            .get(head)
            .ok_or_else(|| CoreError::NotFound(head.to_string()))?;
        match (rest, child) {
            (None, _) => Ok(child),
            (Some(rest), Entity::Namespace(ns)) => ns.lookup(rest),
            (Some(rest), _) => {
                let segment = rest.split('.').next().unwrap_or(rest);
                Err(CoreError::NotFound(segment.to_string()))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.children.iter().map(|(name, entity)| (name.as_str(), entity))
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }
}
