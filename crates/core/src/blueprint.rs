//! Blueprints: plans with named strategies, declared attributes, and extension.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::attr::{Attr, Attrs, Value};
use crate::context::BuildContext;

/// A strategy: one way of building (or tearing down) a blueprint.
pub type StrategyFn = dyn Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync;

/// Strategy run on a plain build.
pub const DEFAULT_STRATEGY: &str = "default";
/// Strategy run when an already-built blueprint is built again with options.
pub const UPDATE_STRATEGY: &str = "update";
/// Strategy run on demolish.
pub const DEMOLISH_STRATEGY: &str = "demolish";

/// A plan specialization with multiple named build strategies and an
/// attribute set.
///
/// Every blueprint carries `default`, `update`, and `demolish` strategies;
/// callers may override any of them or register additional ones, selected at
/// build time by name. `extends` derives the default strategy from another
/// blueprint with merged attributes.
pub struct Blueprint {
    name: String,
    dependencies: Vec<String>,
    strategies: IndexMap<String, Arc<StrategyFn>>,
    attributes: Attrs,
}

impl Blueprint {
    /// Create a blueprint with the given default strategy.
    ///
    /// The built-in `update` strategy merges the call-time options into the
    /// currently bound value; the built-in `demolish` strategy does nothing
    /// (the engine clears the bound state afterwards).
    pub fn new(
        name: impl Into<String>,
        default: impl Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        let mut strategies: IndexMap<String, Arc<StrategyFn>> = IndexMap::new();
        strategies.insert(DEFAULT_STRATEGY.to_string(), Arc::new(default));
        strategies.insert(UPDATE_STRATEGY.to_string(), Arc::new(default_update));
        strategies.insert(DEMOLISH_STRATEGY.to_string(), Arc::new(default_demolish));
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            strategies,
            attributes: Attrs::new(),
        }
    }

    /// Declare dependencies built before this blueprint, in the given order.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Declare one attribute.
    pub fn with_attr(mut self, name: impl Into<String>, attr: Attr) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Declare several attributes at once.
    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attributes.extend(attrs);
        self
    }

    /// Register a named strategy, replacing any previous one with that name.
    pub fn strategy(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.strategies.insert(name.into(), Arc::new(f));
        self
    }

    /// Override the `update` strategy.
    pub fn update(
        self,
        f: impl Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.strategy(UPDATE_STRATEGY, f)
    }

    /// Override the `demolish` strategy.
    pub fn demolish(
        self,
        f: impl Fn(&mut BuildContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.strategy(DEMOLISH_STRATEGY, f)
    }

    /// Derive the default strategy from another blueprint.
    ///
    /// `options` are merged into this blueprint's declared attributes. At
    /// build time the parent is built with this blueprint's full normalized
    /// attribute set as call-time options, bound under this blueprint's
    /// variable name, so the result is whatever the parent's strategy
    /// produces, personalized with the overrides. Extension chains compose to
    /// arbitrary depth.
    pub fn extends(mut self, parent: impl Into<String>, options: Attrs) -> Self {
        self.attributes.extend(options);
        let parent = parent.into();
        self.strategies.insert(
            DEFAULT_STRATEGY.to_string(),
            Arc::new(move |ctx: &mut BuildContext<'_>| {
                let attributes = ctx.attributes().clone();
                let alias = ctx.variable_name().to_string();
                Ok(ctx.build_aliased(&parent, &alias, attributes)?)
            }),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Declared (unnormalized) attributes.
    pub fn attributes(&self) -> &Attrs {
        &self.attributes
    }

    /// Whether a strategy with the given name is defined.
    pub fn has_strategy(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub(crate) fn strategy_fn(&self, name: &str) -> Option<Arc<StrategyFn>> {
        self.strategies.get(name).cloned()
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Built-in update: merge the call-time options into the bound value.
fn default_update(ctx: &mut BuildContext<'_>) -> anyhow::Result<Value> {
    let mut current = ctx.bound_value().cloned().unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut current {
        for (key, value) in ctx.options() {
            fields.insert(key.clone(), value.clone());
        }
    }
    Ok(current)
}

/// Built-in demolish: nothing to release over plain values.
fn default_demolish(_ctx: &mut BuildContext<'_>) -> anyhow::Result<Value> {
    Ok(Value::Null)
}
