//! Plans: memoized leaf build actions.

use std::fmt;
use std::sync::Arc;

use crate::attr::Value;
use crate::context::BuildContext;

/// A build action: runs against a context, produces the value to bind.
pub type ActionFn = dyn Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync;

/// A leaf entity wrapping a single build action.
///
/// Building a plan runs its action at most once per session; repeated build
/// requests are no-ops until the plan is demolished or undone. A plan with no
/// action binds nothing but still participates in dependency ordering.
pub struct Plan {
    name: String,
    dependencies: Vec<String>,
    action: Option<Arc<ActionFn>>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            action: None,
        }
    }

    /// Declare dependencies built before this plan, in the given order.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Set the build action.
    pub fn action(
        mut self,
        f: impl Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.action = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn action_fn(&self) -> Option<&Arc<ActionFn>> {
        self.action.as_ref()
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("action", &self.action.as_ref().map(|_| "<action>"))
            .finish()
    }
}
