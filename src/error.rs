//! Error types for the tinypage generation core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the generation core.
///
/// Only the synchronous rejections (validation, queue and registry state) ever
/// reach a caller. Render, I/O and internal faults happen inside the background
/// loops and are logged there.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Render failed for template '{template}': {message}")]
    Render { template: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal fault: {0}")]
    InternalFault(String),

    #[error("Generation queue is full")]
    QueueFull,

    #[error("Generation core has been shut down")]
    ShutDown,

    #[error("Auto-gen task already registered: {0}")]
    DuplicateTask(String),

    #[error("Auto-gen task not found: {0}")]
    TaskNotFound(String),

    #[error("Completion callback already set")]
    CallbackAlreadySet,

    #[error("Template function already registered: {0}")]
    DuplicateFunction(String),

    #[error("Shared template already registered: {0}")]
    DuplicateSharedTemplate(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was a synchronous rejection rather than a processing failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            PageError::Render { .. } | PageError::Io { .. } | PageError::InternalFault(_)
        )
    }
}

impl From<config::ConfigError> for PageError {
    fn from(err: config::ConfigError) -> Self {
        PageError::ConfigError(err.to_string())
    }
}
