//! Shared test utilities for integration tests

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tinypage::config::PageConfig;
use tinypage::PageData;

/// Serializes tests that touch `TINYPAGE_*` environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// A template root and an output root, removed on drop.
pub struct Site {
    pub templates: TempDir,
    pub output: TempDir,
}

impl Site {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let templates = TempDir::new().unwrap();
        for (name, body) in files {
            let path = templates.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        Self {
            templates,
            output: TempDir::new().unwrap(),
        }
    }

    /// Config with a fast scheduler tick so loop tests finish quickly.
    pub fn config(&self) -> PageConfig {
        let mut config = PageConfig::new(self.templates.path(), self.output.path());
        config.scheduler.tick_ms = 20;
        config
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.output.path().join(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.output.path().join(relative).exists()
    }
}

pub fn data(value: serde_json::Value) -> PageData {
    value.as_object().unwrap().clone()
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}
