//! Structured error types for pokedex-core.
//!
//! Uses `thiserror` so the server and CLI crates can compose these into
//! their own error types. Batch errors are `Clone` because one failure is
//! fanned out to every waiter of a batch.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while computing a connection window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// A count or slice bound was negative
    #[error("Argument \"{argument}\" must be a non-negative integer (got {value})")]
    InvalidArgument { argument: &'static str, value: i64 },
}

/// Result type alias for pagination operations
pub type PaginationResult<T> = std::result::Result<T, PaginationError>;

impl PaginationError {
    /// Create an invalid argument error
    pub fn invalid_argument(argument: &'static str, value: i64) -> Self {
        Self::InvalidArgument { argument, value }
    }
}

/// Errors raised by request scope lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// `RequestScope::current` was called outside `RequestScope::run`
    #[error("No active request scope")]
    NoActiveScope,

    /// A loader id was registered earlier with different key/value types
    #[error("Loader '{id}' is already registered with different key or value types")]
    LoaderTypeMismatch { id: String },
}

impl ScopeError {
    /// Create a loader type mismatch error
    pub fn loader_type_mismatch(id: impl Into<String>) -> Self {
        Self::LoaderTypeMismatch { id: id.into() }
    }
}

/// Failure of a single key inside an otherwise successful batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct KeyError {
    message: Arc<str>,
}

impl KeyError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string().into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of a batch function as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BatchError {
    message: Arc<str>,
}

impl BatchError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string().into(),
        }
    }

    /// The batch function returned a result list that does not line up with its keys
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(format!(
            "batch function returned {} results for {} keys",
            actual, expected
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error observed by a single `Coalescer::load` caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Only this key failed; siblings in the batch are unaffected
    #[error("{source}")]
    Key {
        #[from]
        source: KeyError,
    },

    /// The whole batch failed; every waiter sees the same error
    #[error("Batch '{loader}' failed: {source}")]
    Batch { loader: Arc<str>, source: BatchError },

    /// The batch was dropped before it produced a result for this key
    #[error("Batch '{loader}' was abandoned before completing")]
    Abandoned { loader: Arc<str> },

    /// No scope to look the loader up in
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Result type alias for loads
pub type LoadResult<T> = std::result::Result<T, LoadError>;

impl LoadError {
    /// Create a whole-batch failure for `loader`
    pub fn batch(loader: Arc<str>, source: BatchError) -> Self {
        Self::Batch { loader, source }
    }

    /// Create an abandoned-batch error for `loader`
    pub fn abandoned(loader: Arc<str>) -> Self {
        Self::Abandoned { loader }
    }

    /// Whether this error affects only the one key that observed it
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::Key { .. })
    }
}
