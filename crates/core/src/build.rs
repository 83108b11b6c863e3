//! The build engine: dependency satisfaction, memoization, strategy
//! dispatch, and demolish/undo.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use crate::attr::{Attr, Attrs, Value, normalize};
use crate::blueprint::{Blueprint, DEFAULT_STRATEGY, DEMOLISH_STRATEGY, StrategyFn, UPDATE_STRATEGY};
use crate::catalog::{Catalog, join_path, last_segment, parent_path};
use crate::context::BuildContext;
use crate::entity::Entity;
use crate::error::CoreError;
use crate::namespace::Namespace;
use crate::plan::Plan;
use crate::session::Session;

/// One build request: a name, plus optional call-time options, strategy
/// selection, and an alias to bind the result under.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    name: String,
    alias: Option<String>,
    strategy: Option<String>,
    options: Attrs,
}

impl BuildRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Bind the result under `alias` instead of the entity's own name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Select a named strategy instead of `default`.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Add one call-time option.
    pub fn with_option(mut self, name: impl Into<String>, option: Attr) -> Self {
        self.options.insert(name.into(), option);
        self
    }

    /// Merge call-time options.
    pub fn with_options(mut self, options: Attrs) -> Self {
        self.options.extend(options);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for BuildRequest {
    fn from(name: &str) -> Self {
        BuildRequest::new(name)
    }
}

impl From<String> for BuildRequest {
    fn from(name: String) -> Self {
        BuildRequest::new(name)
    }
}

/// Which executed names a demolish request clears without running their
/// demolish strategies.
#[derive(Debug, Clone, Default)]
pub enum Undo {
    #[default]
    None,
    Names(Vec<String>),
    All,
}

/// A demolish request: scope names whose demolish strategies run, plus an
/// undo selection cleared without running strategies.
#[derive(Debug, Clone, Default)]
pub struct DemolishRequest {
    scopes: Vec<String>,
    undo: Undo,
}

impl DemolishRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the demolish strategy for this name (recursively for namespaces).
    pub fn scope(mut self, name: impl Into<String>) -> Self {
        self.scopes.push(name.into());
        self
    }

    /// Mark these names as not built, without running demolish strategies.
    pub fn undo_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.undo = Undo::Names(names.into_iter().map(Into::into).collect());
        self
    }

    /// Mark every executed name as not built.
    pub fn undo_all(mut self) -> Self {
        self.undo = Undo::All;
        self
    }
}

/// Build each request in order; dependencies are satisfied first and
/// already-built entities are skipped. Returns the last request's result.
pub fn build(catalog: &Catalog, session: &mut Session, requests: &[BuildRequest]) -> Result<Value, CoreError> {
    build_all(catalog, session, requests, false)
}

/// Build each request, re-executing even already-built entities.
pub fn build_forced(
    catalog: &Catalog,
    session: &mut Session,
    requests: &[BuildRequest],
) -> Result<Value, CoreError> {
    build_all(catalog, session, requests, true)
}

fn build_all(
    catalog: &Catalog,
    session: &mut Session,
    requests: &[BuildRequest],
    forced: bool,
) -> Result<Value, CoreError> {
    let mut result = Value::Null;
    for request in requests {
        result = build_in(catalog, session, "", request, forced)?;
    }
    Ok(result)
}

/// Normalized attributes for a blueprint, without building it.
pub fn build_attributes(
    catalog: &Catalog,
    session: &Session,
    name: &str,
) -> Result<IndexMap<String, Value>, CoreError> {
    let (_, entity) = catalog.resolve("", name)?;
    match entity {
        Entity::Blueprint(blueprint) => Ok(normalize(blueprint.attributes(), session)),
        _ => Ok(IndexMap::new()),
    }
}

/// Run demolish strategies for the requested scopes, then apply the undo
/// selection.
pub fn demolish(
    catalog: &Catalog,
    session: &mut Session,
    request: &DemolishRequest,
) -> Result<(), CoreError> {
    for scope in &request.scopes {
        let (path, entity) = catalog.resolve("", scope)?;
        demolish_entity(catalog, session, &path, entity)?;
    }
    match &request.undo {
        Undo::None => {}
        Undo::Names(names) => {
            for name in names {
                let (path, _) = catalog.resolve("", name)?;
                session.undo(&path);
            }
        }
        Undo::All => session.undo_all(),
    }
    Ok(())
}

/// Build `request.name` resolved relative to `namespace` (root fallback).
pub(crate) fn build_in(
    catalog: &Catalog,
    session: &mut Session,
    namespace: &str,
    request: &BuildRequest,
    forced: bool,
) -> Result<Value, CoreError> {
    let (path, entity) = catalog.resolve(namespace, &request.name)?;

    // The owning namespace's own dependencies come first, then the entity's.
    let ns_path = parent_path(&path);
    if !ns_path.is_empty() {
        let ns = catalog.namespace_at(ns_path)?;
        build_dependencies(catalog, session, parent_path(ns_path), ns.dependencies())?;
    }
    build_dependencies(catalog, session, ns_path, entity.dependencies())?;

    build_entity(catalog, session, &path, entity, request, forced)
}

/// Depth-first, declaration-order dependency satisfaction. Each name
/// resolves in the owning namespace first, then the root.
fn build_dependencies(
    catalog: &Catalog,
    session: &mut Session,
    namespace: &str,
    dependencies: &[String],
) -> Result<(), CoreError> {
    for dependency in dependencies {
        let (path, entity) = catalog.resolve(namespace, dependency)?;
        build_dependencies(catalog, session, parent_path(&path), entity.dependencies())?;
        build_entity(catalog, session, &path, entity, &BuildRequest::new(dependency.clone()), false)?;
    }
    Ok(())
}

fn build_entity(
    catalog: &Catalog,
    session: &mut Session,
    path: &str,
    entity: &Entity,
    request: &BuildRequest,
    forced: bool,
) -> Result<Value, CoreError> {
    match entity {
        Entity::Plan(plan) => build_plan(catalog, session, path, plan, request, forced),
        Entity::Blueprint(blueprint) => build_blueprint(catalog, session, path, blueprint, request, forced),
        Entity::Namespace(ns) => build_namespace(catalog, session, path, ns, request, forced),
    }
}

/// Build every child in insertion order and bind the deduplicated list of
/// results under the namespace's name. The aggregate is always recomputed;
/// only the children themselves are memoized.
fn build_namespace(
    catalog: &Catalog,
    session: &mut Session,
    path: &str,
    ns: &Namespace,
    request: &BuildRequest,
    forced: bool,
) -> Result<Value, CoreError> {
    let mut results: Vec<Value> = Vec::new();
    for (child_name, child) in ns.children() {
        let child_path = join_path(path, child_name);
        build_dependencies(catalog, session, path, child.dependencies())?;
        let result = build_entity(
            catalog,
            session,
            &child_path,
            child,
            &BuildRequest::new(child_name),
            forced,
        )?;
        if !results.contains(&result) {
            results.push(result);
        }
    }
    let variable_name = request.alias.clone().unwrap_or_else(|| last_segment(path).to_string());
    let aggregate = Value::Array(results);
    session.set_var(variable_name, aggregate.clone());
    debug!(name = %path, children = ns.len(), "namespace built");
    Ok(aggregate)
}

fn build_plan(
    catalog: &Catalog,
    session: &mut Session,
    path: &str,
    plan: &Plan,
    request: &BuildRequest,
    forced: bool,
) -> Result<Value, CoreError> {
    let variable_name = request.alias.clone().unwrap_or_else(|| last_segment(path).to_string());
    if !forced && session.is_executed(path) {
        debug!(name = %path, "plan already built, skipping");
        return Ok(session.result(path).cloned().unwrap_or(Value::Null));
    }

    let mut result = Value::Null;
    if let Some(action) = plan.action_fn() {
        let action = Arc::clone(action);
        let options = normalize(&request.options, session);
        let mut ctx = BuildContext::new(
            catalog,
            session,
            parent_path(path).to_string(),
            variable_name.clone(),
            options,
            IndexMap::new(),
        );
        result = match (*action)(&mut ctx) {
            Ok(value) => value,
            Err(source) => {
                error!(name = %path, error = %source, "build action failed");
                return Err(CoreError::BuildFailed {
                    name: path.to_string(),
                    source,
                });
            }
        };
        session.set_var(variable_name, result.clone());
        session.store_result(path, result.clone());
        session.bump_uses(path);
    }
    session.mark_executed(path);
    debug!(name = %path, "plan built");
    Ok(result)
}

fn build_blueprint(
    catalog: &Catalog,
    session: &mut Session,
    path: &str,
    blueprint: &Blueprint,
    request: &BuildRequest,
    forced: bool,
) -> Result<Value, CoreError> {
    let variable_name = request.alias.clone().unwrap_or_else(|| last_segment(path).to_string());
    let ns_path = parent_path(path).to_string();

    if session.is_executed(path) && !forced {
        if request.options.is_empty() {
            debug!(name = %path, "blueprint already built, skipping");
            return Ok(session.result(path).cloned().unwrap_or(Value::Null));
        }

        // A second build with different data is usually a surprise worth
        // flagging, but it is not an error: the update strategy reconciles
        // the new options with the existing bound value.
        warn!(name = %path, "already built, applying new options via the update strategy");
        if let Some(update) = blueprint.strategy_fn(UPDATE_STRATEGY) {
            let (options, attributes) = normalized(blueprint, request, session);
            let mut ctx = BuildContext::new(catalog, session, ns_path, variable_name.clone(), options, attributes);
            let result = run_strategy(&update, &mut ctx, path)?;
            session.set_var(variable_name, result.clone());
            session.store_result(path, result.clone());
            session.bump_uses(path);
            return Ok(result);
        }
        return Ok(session.result(path).cloned().unwrap_or(Value::Null));
    }

    let strategy_name = request.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY);
    let Some(strategy) = blueprint.strategy_fn(strategy_name) else {
        debug!(name = %path, strategy = strategy_name, "strategy not defined, skipping");
        return Ok(Value::Null);
    };
    let (options, attributes) = normalized(blueprint, request, session);
    let mut ctx = BuildContext::new(catalog, session, ns_path, variable_name.clone(), options, attributes);
    let result = run_strategy(&strategy, &mut ctx, path)?;
    session.set_var(variable_name, result.clone());
    session.store_result(path, result.clone());
    session.mark_executed(path);
    session.bump_uses(path);
    debug!(name = %path, strategy = strategy_name, "blueprint built");
    Ok(result)
}

/// Normalized call-time options and the full attribute set (declared
/// attributes reverse-merged with the options; call-time wins).
fn normalized(
    blueprint: &Blueprint,
    request: &BuildRequest,
    session: &Session,
) -> (IndexMap<String, Value>, IndexMap<String, Value>) {
    let mut merged = blueprint.attributes().clone();
    merged.extend(request.options.clone());
    (normalize(&request.options, session), normalize(&merged, session))
}

fn run_strategy(
    strategy: &Arc<StrategyFn>,
    ctx: &mut BuildContext<'_>,
    path: &str,
) -> Result<Value, CoreError> {
    (**strategy)(ctx).map_err(|source| {
        error!(name = %path, error = %source, "build action failed");
        CoreError::BuildFailed {
            name: path.to_string(),
            source,
        }
    })
}

fn demolish_entity(
    catalog: &Catalog,
    session: &mut Session,
    path: &str,
    entity: &Entity,
) -> Result<(), CoreError> {
    match entity {
        // Demolish built children in insertion order; unbuilt ones are
        // skipped rather than an error.
        Entity::Namespace(ns) => {
            for (child_name, child) in ns.children() {
                let child_path = join_path(path, child_name);
                let recurse = child.is_namespace() || session.is_executed(&child_path);
                if recurse {
                    demolish_entity(catalog, session, &child_path, child)?;
                }
            }
            Ok(())
        }
        Entity::Plan(_) => {
            if !session.is_executed(path) {
                return Err(CoreError::NotBuilt(path.to_string()));
            }
            session.undo(path);
            debug!(name = %path, "plan demolished");
            Ok(())
        }
        Entity::Blueprint(blueprint) => {
            if !session.is_executed(path) {
                return Err(CoreError::NotBuilt(path.to_string()));
            }
            if let Some(strategy) = blueprint.strategy_fn(DEMOLISH_STRATEGY) {
                let attributes = normalize(blueprint.attributes(), session);
                let mut ctx = BuildContext::new(
                    catalog,
                    session,
                    parent_path(path).to_string(),
                    last_segment(path).to_string(),
                    IndexMap::new(),
                    attributes,
                );
                run_strategy(&strategy, &mut ctx, path)?;
            }
            session.undo(path);
            debug!(name = %path, "blueprint demolished");
            Ok(())
        }
    }
}
