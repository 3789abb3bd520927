//! Error types for the reactive engine.
//!
//! Everything in the engine is synchronous local computation, so there are no
//! transient or retryable failures. Errors propagate to the immediate caller.

use thiserror::Error;

/// Errors surfaced by the engine's fallible entry points.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// An object was required but something else was supplied.
    #[error("invalid argument: expected {expected}, found {found}")]
    InvalidArgument {
        expected: &'static str,
        found: &'static str,
    },

    /// A strategy or engine name that does not exist.
    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),

    /// A benchmark configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Shorthand for the "expected an object" failure.
    pub(crate) fn not_an_object(found: &'static str) -> Self {
        Self::InvalidArgument {
            expected: "object",
            found,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
