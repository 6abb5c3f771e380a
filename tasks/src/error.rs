//! Error types for the tasks library.

use crate::config::ConfigError;
use std::fmt;

/// How a task was looked up, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdLookup {
    Exact(String),
    Containing(String),
}

impl fmt::Display for IdLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdLookup::Exact(id) => write!(f, "\"{}\"", id),
            IdLookup::Containing(fragment) => write!(f, "containing \"{}\"", fragment),
        }
    }
}

/// All errors surfaced by the tasks library.
#[derive(Debug, thiserror::Error)]
pub enum TasksError {
    #[error("no tasks found with id {0}")]
    NotFound(IdLookup),

    #[error("more than one task found with id {0}")]
    Ambiguous(IdLookup),

    #[error("tasks peer is already initialized")]
    AlreadyInitialized,

    #[error("tasks peer has not been initialized")]
    NotInitialized,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unable to {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: quickstart_engine::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Log(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TasksError {
    /// Errors caused by calling into the library in the wrong lifecycle
    /// state rather than by bad input or a failing store.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            TasksError::AlreadyInitialized | TasksError::NotInitialized
        )
    }

    /// Wrap an engine error with the action that failed.
    pub(crate) fn store(action: &'static str) -> impl FnOnce(quickstart_engine::Error) -> Self {
        move |source| TasksError::Store { action, source }
    }
}

/// Result type for tasks operations.
pub type Result<T> = std::result::Result<T, TasksError>;
