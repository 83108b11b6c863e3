//! The entity sum type and name validation.

use crate::blueprint::Blueprint;
use crate::error::CoreError;
use crate::namespace::Namespace;
use crate::plan::Plan;

/// Any named, buildable node: a namespace, a plan, or a blueprint.
#[derive(Debug)]
pub enum Entity {
    Namespace(Namespace),
    Plan(Plan),
    Blueprint(Blueprint),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Namespace(ns) => ns.name(),
            Entity::Plan(plan) => plan.name(),
            Entity::Blueprint(blueprint) => blueprint.name(),
        }
    }

    /// Declared dependency names, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Entity::Namespace(ns) => ns.dependencies(),
            Entity::Plan(plan) => plan.dependencies(),
            Entity::Blueprint(blueprint) => blueprint.dependencies(),
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self, Entity::Namespace(_))
    }

    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Entity::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

impl From<Namespace> for Entity {
    fn from(ns: Namespace) -> Self {
        Entity::Namespace(ns)
    }
}

impl From<Plan> for Entity {
    fn from(plan: Plan) -> Self {
        Entity::Plan(plan)
    }
}

impl From<Blueprint> for Entity {
    fn from(blueprint: Blueprint) -> Self {
        Entity::Blueprint(blueprint)
    }
}

/// Check that a name can serve as one path segment.
pub(crate) fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
