//! error
//!
//! Error type for store operations.
//!
//! # Design
//!
//! Host failures are caught at the operation boundary (`push`, `get`,
//! `open_pull_request`, branch management) and re-raised as
//! [`StoreError::Remote`]. The underlying [`HostError`] is kept as the
//! error's `source()`, and its message is part of the `Display` output.
//!
//! Two host outcomes are not errors: a branch that already
//! exists when ensuring it, and a pull request that already exists when
//! opening one.
//!
//! # Example
//!
//! ```
//! use std::error::Error;
//! use gitkv::error::StoreError;
//! use gitkv::host::HostError;
//!
//! let err = StoreError::remote("failed to push", HostError::RateLimited);
//! assert_eq!(err.to_string(), "failed to push: rate limited");
//! assert!(err.source().is_some());
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::types::TypeError;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request is invalid before any remote call (e.g., nothing staged).
    #[error("validation error: {0}")]
    Validation(String),

    /// Attempted to delete `main` or `master`.
    #[error("cannot delete protected branch '{0}'")]
    ProtectedBranch(String),

    /// A host call failed.
    #[error("{context}: {source}")]
    Remote {
        /// What the store was doing.
        context: String,
        /// The host's error.
        #[source]
        source: HostError,
    },

    /// The host has no file at this path on the current branch.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Wrap a host error with what the store was doing.
    pub fn remote(context: impl Into<String>, source: HostError) -> Self {
        StoreError::Remote {
            context: context.into(),
            source,
        }
    }

    /// The underlying host error, for remote failures.
    pub fn host_error(&self) -> Option<&HostError> {
        match self {
            StoreError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
