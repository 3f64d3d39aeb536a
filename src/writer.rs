//! Static Page Writer
//!
//! Persists rendered pages under the static root and reads them back.
//! Output location: `{static_root}/{sub_dir}/{page}{extension}`, or
//! `{static_root}/{page}{extension}` without a sub directory.

use crate::error::PageError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for rendered pages.
pub trait Writer: Send + Sync {
    fn persist(&self, sub_dir: Option<&str>, page: &str, bytes: &[u8]) -> Result<(), PageError>;

    fn read_back(&self, sub_dir: Option<&str>, page: &str) -> Result<Vec<u8>, PageError>;
}

/// Filesystem writer rooted at the static output directory.
#[derive(Debug, Clone)]
pub struct StaticWriter {
    static_root: PathBuf,
    extension: String,
}

impl StaticWriter {
    pub fn new(static_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            static_root: static_root.into(),
            extension: extension.into(),
        }
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    pub fn output_path(&self, sub_dir: Option<&str>, page: &str) -> PathBuf {
        let file_name = format!("{}{}", page, self.extension);
        match sub_dir.filter(|s| !s.is_empty()) {
            Some(sub_dir) => self.static_root.join(sub_dir).join(file_name),
            None => self.static_root.join(file_name),
        }
    }
}

impl Writer for StaticWriter {
    fn persist(&self, sub_dir: Option<&str>, page: &str, bytes: &[u8]) -> Result<(), PageError> {
        let path = self.output_path(sub_dir, page);
        if let Some(parent) = path.parent() {
            // create_dir_all succeeds when the directory already exists
            fs::create_dir_all(parent).map_err(|e| PageError::io(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| PageError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote page");
        Ok(())
    }

    fn read_back(&self, sub_dir: Option<&str>, page: &str) -> Result<Vec<u8>, PageError> {
        let path = self.output_path(sub_dir, page);
        fs::read(&path).map_err(|e| PageError::io(&path, e))
    }
}
