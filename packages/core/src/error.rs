//! Error types shared across the fedstore crates.

use fedstore_path_expr::ExpressionError;
use thiserror::Error;

use crate::Path;

/// Errors raised by sources, projections and the federation engine.
///
/// Errors are `Clone` so that one failure (say, a source that cannot be
/// reached) can be reported against every request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A path expression could not be compiled.
    #[error("invalid path expression: {0}")]
    InvalidExpression(#[from] ExpressionError),

    /// A graph path string could not be parsed.
    #[error("invalid path: {message}")]
    InvalidPath { message: String },

    /// A projection rule is malformed or conflicts with another rule.
    #[error("invalid projection rule '{rule}': {message}")]
    InvalidProjection { rule: String, message: String },

    /// No workspace has the requested name.
    #[error("no workspace named '{name}'")]
    InvalidWorkspace { name: String },

    /// No projection covers the path.
    #[error("no source projects the path {path}")]
    NoSourceForPath { path: Path },

    /// The path does not exist in the source.
    #[error("path not found: {path}")]
    PathNotFound { path: Path },

    /// The path belongs to a read-only projection or placeholder.
    #[error("path is read-only: {path}")]
    ReadOnly { path: Path },

    /// A connection to a source could not be established.
    #[error("cannot connect to source '{source_name}': {message}")]
    Connection {
        source_name: String,
        message: String,
    },

    /// A source failed while executing a request.
    #[error("execution failed: {message}")]
    Execution { message: String },

    /// Work was added to a channel after it was marked done.
    #[error("channel for source '{source_name}' is closed")]
    ChannelClosed { source_name: String },

    /// The connection was already closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Error::InvalidPath {
            message: message.into(),
        }
    }
}
