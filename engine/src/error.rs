//! Error types for the quickstart engine.

use crate::DocumentId;
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Query errors
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("missing query parameter: {0}")]
    MissingParameter(String),

    #[error("invalid query arguments: {0}")]
    InvalidArguments(String),

    #[error("type error: {0}")]
    Type(String),

    // Document errors
    #[error("document already exists: {0}")]
    DuplicateId(DocumentId),

    #[error("document id cannot be changed: {0}")]
    ImmutableId(DocumentId),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    // Lifecycle errors
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("engine has been closed")]
    Closed,
}

impl Error {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::syntax(7, "expected FROM");
        assert_eq!(err.to_string(), "syntax error at position 7: expected FROM");

        let err = Error::DuplicateId("abc".into());
        assert_eq!(err.to_string(), "document already exists: abc");

        let err = Error::MissingParameter("id".into());
        assert_eq!(err.to_string(), "missing query parameter: id");
    }

    #[test]
    fn io_errors_become_persistence_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(io), Error::Persistence(msg) if msg == "denied"));
    }
}
