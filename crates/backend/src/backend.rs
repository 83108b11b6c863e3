//! The backend contract and the built-in no-op implementation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;

/// How `delete_tables` clears data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete rows, keeping sequences and table metadata
    #[default]
    Delete,
    /// Truncate tables, resetting sequences
    Truncate,
}

impl DeletePolicy {
    /// Returns the policy name as used in configuration strings
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Delete => "delete",
            DeletePolicy::Truncate => "truncate",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(DeletePolicy::Delete),
            "truncate" => Ok(DeletePolicy::Truncate),
            other => Err(BackendError::UnsupportedPolicy(other.to_string())),
        }
    }
}

/// Which backend implementation a session runs against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No persistence; fixtures are plain in-memory values
    #[default]
    Null,
}

impl BackendKind {
    /// Returns the backend name as used in configuration strings
    pub const fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Null => "null",
        }
    }

    /// Instantiate the backend this kind names.
    pub fn create(&self) -> Box<dyn Backend> {
        match self {
            BackendKind::Null => Box::new(NullBackend),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(BackendKind::Null),
            other => Err(BackendError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Contract between the build engine and the store holding built fixtures.
///
/// One transaction brackets one build session: `start_transaction` at setup,
/// `rollback_transaction` at teardown so nothing a session built leaks into
/// the next one. `delete_tables` with an empty slice clears every table.
pub trait Backend {
    fn start_transaction(&mut self) -> Result<(), BackendError>;

    fn rollback_transaction(&mut self) -> Result<(), BackendError>;

    fn delete_tables(&mut self, policy: DeletePolicy, tables: &[String]) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn start_transaction(&mut self) -> Result<(), BackendError> {
        (**self).start_transaction()
    }

    fn rollback_transaction(&mut self) -> Result<(), BackendError> {
        (**self).rollback_transaction()
    }

    fn delete_tables(&mut self, policy: DeletePolicy, tables: &[String]) -> Result<(), BackendError> {
        (**self).delete_tables(policy, tables)
    }
}

/// Backend for sessions that only build in-memory values.
///
/// Every operation succeeds without touching anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn start_transaction(&mut self) -> Result<(), BackendError> {
        debug!("null backend: start_transaction");
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), BackendError> {
        debug!("null backend: rollback_transaction");
        Ok(())
    }

    fn delete_tables(&mut self, policy: DeletePolicy, tables: &[String]) -> Result<(), BackendError> {
        debug!(%policy, ?tables, "null backend: delete_tables");
        Ok(())
    }
}
