//! Shared data types passed between the facade and the background loops.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use std::sync::Arc;

/// Template data payload: arbitrary JSON values keyed by name.
pub type PageData = serde_json::Map<String, serde_json::Value>;

/// Invoked after a page has been written, with the page name and the bytes read back.
/// The return value is advisory.
pub type CompletionCallback = Arc<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;

/// Zero-argument action fired by the auto-gen scheduler.
pub type AutoGenCallback = Arc<dyn Fn() + Send + Sync>;

/// A unit of work asking the worker to render `template` with `data` into `page`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Template file, relative to the template root
    pub template: String,
    /// Optional subdirectory under the static root
    #[serde(default)]
    pub sub_dir: Option<String>,
    /// Output name, without extension
    pub page: String,
    /// Template context
    pub data: PageData,
}

impl GenerationRequest {
    /// Build a request. An empty `sub_dir` means the static root itself.
    pub fn new(
        template: impl Into<String>,
        sub_dir: impl Into<String>,
        page: impl Into<String>,
        data: PageData,
    ) -> Self {
        let sub_dir = sub_dir.into();
        Self {
            template: template.into(),
            sub_dir: if sub_dir.is_empty() { None } else { Some(sub_dir) },
            page: page.into(),
            data,
        }
    }

    pub fn sub_dir(&self) -> Option<&str> {
        self.sub_dir.as_deref().filter(|s| !s.is_empty())
    }

    /// Check required fields. Runs before a request is allowed into the queue.
    pub fn validate(&self) -> Result<(), PageError> {
        if self.template.trim().is_empty() {
            return Err(PageError::Validation("template is required".to_string()));
        }
        if self.page.trim().is_empty() {
            return Err(PageError::Validation("page is required".to_string()));
        }
        if self.data.is_empty() {
            return Err(PageError::Validation("data must not be empty".to_string()));
        }
        ensure_relative("template", &self.template)?;
        ensure_relative("page", &self.page)?;
        if let Some(sub_dir) = self.sub_dir() {
            ensure_relative("sub_dir", sub_dir)?;
        }
        Ok(())
    }
}

/// Reject absolute paths and parent components so outputs stay under their root.
pub(crate) fn ensure_relative(field: &str, value: &str) -> Result<(), PageError> {
    let escapes = Path::new(value).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(PageError::Validation(format!(
            "{} must be a relative path without '..': {}",
            field, value
        )));
    }
    Ok(())
}
