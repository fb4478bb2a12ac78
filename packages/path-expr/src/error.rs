//! Errors raised while compiling path expressions.

use thiserror::Error;

/// A path expression could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// No expression was supplied at all.
    #[error("path expression may not be null")]
    Missing,

    /// The expression was empty or contained only whitespace.
    #[error("path expression may not be blank")]
    Blank,

    /// The expression could not be translated into a matcher.
    #[error("invalid path expression '{expression}': {message}")]
    Invalid { expression: String, message: String },
}

impl ExpressionError {
    pub(crate) fn invalid(expression: impl Into<String>, message: impl Into<String>) -> Self {
        ExpressionError::Invalid {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
