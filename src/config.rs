//! Configuration System
//!
//! Layered configuration for the generation core: built-in defaults, an optional
//! config file, then `TINYPAGE_*` environment variables. Validation collects every
//! problem at once.

use crate::error::PageError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::render::RenderConfig;
pub use crate::scheduler::SchedulerConfig;
pub use crate::worker::WorkerConfig;

mod merge;
mod sources;

pub use sources::environment::ENV_PREFIX;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Directory templates are loaded from
    pub template_root: PathBuf,

    /// Directory rendered pages are written to
    pub static_root: PathBuf,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PageConfig {
    /// Config with default settings for the given roots.
    pub fn new(template_root: impl Into<PathBuf>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            static_root: static_root.into(),
            render: RenderConfig::default(),
            worker: WorkerConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.template_root.as_os_str().is_empty() {
            errors.push(ValidationError::Paths(
                "template_root cannot be empty".to_string(),
            ));
        }
        if self.static_root.as_os_str().is_empty() {
            errors.push(ValidationError::Paths(
                "static_root cannot be empty".to_string(),
            ));
        }

        let extension = &self.render.extension;
        if !extension.is_empty() && !extension.starts_with('.') {
            errors.push(ValidationError::Render(format!(
                "extension must start with '.': {}",
                extension
            )));
        }

        if self.worker.queue_capacity == 0 {
            errors.push(ValidationError::Worker(
                "queue_capacity must be at least 1".to_string(),
            ));
        }

        if self.scheduler.tick_ms == 0 {
            errors.push(ValidationError::Scheduler(
                "tick_ms must be at least 1".to_string(),
            ));
        }
        if self.scheduler.tick_ms > self.scheduler.min_interval_secs.saturating_mul(1000)
            && self.scheduler.min_interval_secs > 0
        {
            errors.push(ValidationError::Scheduler(format!(
                "tick ({} ms) is coarser than the interval floor ({} s)",
                self.scheduler.tick_ms, self.scheduler.min_interval_secs
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into one error.
    pub fn ensure_valid(&self) -> Result<(), PageError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PageError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Paths(String),
    Render(String),
    Worker(String),
    Scheduler(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Paths(msg) => write!(f, "Paths: {}", msg),
            ValidationError::Render(msg) => write!(f, "Render: {}", msg),
            ValidationError::Worker(msg) => write!(f, "Worker: {}", msg),
            ValidationError::Scheduler(msg) => write!(f, "Scheduler: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Loads [`PageConfig`] from defaults, an optional file and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration. Precedence: environment > file > defaults.
    pub fn load(path: Option<&Path>) -> Result<PageConfig, PageError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        if let Some(path) = path {
            builder = sources::file::add_to_builder(builder, path)?;
        }
        builder = sources::environment::add_to_builder(builder);
        let config: PageConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load from a specific file, then validate.
    pub fn load_from_file(path: &Path) -> Result<PageConfig, PageError> {
        let config = Self::load(Some(path))?;
        config.ensure_valid()?;
        Ok(config)
    }
}
