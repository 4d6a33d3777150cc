//! Error types for the tdsql harness
//!
//! One error enum covers the whole run. The variants map onto the harness
//! failure taxonomy: broken input is fatal before any query executes, a
//! failed query is captured per test side, an assertion failure is collected
//! per test case, and an internal error means the harness itself misbehaved.

use std::fmt;
use std::io;

/// Main error type for harness operations
#[derive(Debug, Clone)]
pub enum TdsqlError {
    /// Malformed configuration, unresolvable reference, cycle, or
    /// directive violation. Always fatal before execution starts.
    InvalidInput {
        message: String,
        path: Option<String>,
    },

    /// Query execution failure, carrying the backend's diagnostic.
    /// Captured per test side, never fatal to the run.
    Query { message: String },

    /// Actual and expected result sets do not match.
    Assertion { message: String },

    /// Invariant violation inside the harness (e.g. a result slot that was
    /// never populated). Not a user-facing failure mode.
    Internal { message: String },

    /// IO error (file operations)
    Io { message: String, path: String },
}

impl fmt::Display for TdsqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TdsqlError::InvalidInput { message, path } => {
                if let Some(p) = path {
                    write!(f, "invalid input in {}: {}", p, message)
                } else {
                    write!(f, "invalid input: {}", message)
                }
            }
            TdsqlError::Query { message } => {
                write!(f, "query error: {}", message)
            }
            TdsqlError::Assertion { message } => {
                write!(f, "{}", message)
            }
            TdsqlError::Internal { message } => {
                write!(f, "internal error: {}", message)
            }
            TdsqlError::Io { message, path } => {
                write!(f, "IO error for '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for TdsqlError {}

impl From<io::Error> for TdsqlError {
    fn from(err: io::Error) -> Self {
        TdsqlError::Io {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

impl From<serde_yaml::Error> for TdsqlError {
    fn from(err: serde_yaml::Error) -> Self {
        TdsqlError::InvalidInput {
            message: err.to_string(),
            path: None,
        }
    }
}

impl TdsqlError {
    /// Shorthand for an `InvalidInput` without file context
    pub fn invalid(message: impl Into<String>) -> Self {
        TdsqlError::InvalidInput {
            message: message.into(),
            path: None,
        }
    }

    /// Shorthand for an `InvalidInput` pinned to a file
    pub fn invalid_at(message: impl Into<String>, path: impl Into<String>) -> Self {
        TdsqlError::InvalidInput {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

/// Result type alias for harness operations
pub type TdsqlResult<T> = Result<T, TdsqlError>;
