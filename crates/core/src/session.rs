//! Session state: the variable context and the executed-name registry.
//!
//! Everything a build mutates lives here, owned by the caller and passed by
//! reference into every build and demolish call. Session boundaries between
//! test cases are explicit `reset` calls; `snapshot` captures the current
//! state as the baseline that `reset` restores, which is how prebuilt
//! fixtures survive across cases.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::attr::Value;

#[derive(Debug, Clone, Default)]
struct State {
    variables: IndexMap<String, Value>,
    executed: IndexSet<String>,
    results: HashMap<String, Value>,
    uses: HashMap<String, u32>,
}

/// One build session's mutable state.
#[derive(Debug, Default)]
pub struct Session {
    state: State,
    baseline: Option<State>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bound variable.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.state.variables.get(name)
    }

    /// Bind a variable, replacing any previous value.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.state.variables.insert(name.into(), value);
    }

    /// Remove a binding, returning the previous value.
    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        self.state.variables.shift_remove(name)
    }

    /// All bound variables, in binding order.
    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.state.variables
    }

    /// Whether the entity at `path` was built this session.
    pub fn is_executed(&self, path: &str) -> bool {
        self.state.executed.contains(path)
    }

    pub(crate) fn mark_executed(&mut self, path: &str) {
        self.state.executed.insert(path.to_string());
    }

    /// Executed entity paths, in execution order.
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.state.executed.iter().map(String::as_str)
    }

    /// The result the entity at `path` produced when it last executed.
    ///
    /// Unlike variables, results are keyed by path, so they survive aliased
    /// builds binding under a different name.
    pub fn result(&self, path: &str) -> Option<&Value> {
        self.state.results.get(path)
    }

    pub(crate) fn store_result(&mut self, path: &str, value: Value) {
        self.state.results.insert(path.to_string(), value);
    }

    /// Clear `path`'s executed state and bound variable without running any
    /// demolish strategy. Returns whether the path had been executed.
    pub fn undo(&mut self, path: &str) -> bool {
        let was_executed = self.state.executed.shift_remove(path);
        if was_executed {
            let short = path.rsplit('.').next().unwrap_or(path).to_string();
            self.state.variables.shift_remove(&short);
            self.state.variables.shift_remove(path);
            self.state.results.remove(path);
            debug!(name = %path, "undone");
        }
        was_executed
    }

    /// Undo every executed name.
    pub fn undo_all(&mut self) {
        let paths: Vec<String> = self.state.executed.iter().cloned().collect();
        for path in paths {
            self.undo(&path);
        }
    }

    /// How many times the entity at `path` actually executed a build.
    pub fn uses(&self, path: &str) -> u32 {
        self.state.uses.get(path).copied().unwrap_or(0)
    }

    pub(crate) fn bump_uses(&mut self, path: &str) {
        *self.state.uses.entry(path.to_string()).or_insert(0) += 1;
    }

    /// Capture the current state as the baseline `reset` restores.
    pub fn snapshot(&mut self) {
        self.baseline = Some(self.state.clone());
    }

    /// Restore the baseline snapshot, or clear everything if none was taken.
    pub fn reset(&mut self) {
        self.state = self.baseline.clone().unwrap_or_default();
    }

    /// Drop all state including the baseline.
    pub fn clear(&mut self) {
        self.state = State::default();
        self.baseline = None;
    }
}
