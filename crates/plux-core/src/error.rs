//! # Plux Errors
//!
//! Crate level error type.
//!
//! [`Error`] wraps the error of each subsystem ([`PluginError`] for the
//! plugin lifecycle, [`IndexError`] for the index file, [`ConfigError`] for
//! configuration) so that a host driving several of them, such as the `plux`
//! command line tool, can use a single `Result` type.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::build::index::IndexError;
use crate::config::ConfigError;
use crate::core::error::{PluginError, ResolutionError};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Plugin index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- File Errors ---
    #[error("I/O error during operation '{operation}' on path '{}': {source}", path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Build an `Io` error for a failed file operation
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

impl From<ResolutionError> for Error {
    fn from(err: ResolutionError) -> Self {
        Error::Plugin(PluginError::Resolution(err))
    }
}

/// Result type alias for Plux operations
pub type Result<T> = StdResult<T, Error>;
