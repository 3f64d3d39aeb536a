//! Integration tests for Configuration System

use crate::integration::test_utils::{data, Site, ENV_MUTEX};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use tinypage::config::ConfigLoader;
use tinypage::error::PageError;
use tinypage::Page;

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("tinypage.toml");
    std::fs::write(
        &config_file,
        r#"
template_root = "/srv/tpl"
static_root = "/srv/html"

[worker]
queue_capacity = 16
"#,
    )
    .unwrap();

    std::env::set_var("TINYPAGE_WORKER__QUEUE_CAPACITY", "7");
    std::env::set_var("TINYPAGE_STATIC_ROOT", "/var/www");
    let loaded = ConfigLoader::load(Some(&config_file));
    std::env::remove_var("TINYPAGE_WORKER__QUEUE_CAPACITY");
    std::env::remove_var("TINYPAGE_STATIC_ROOT");

    let config = loaded.unwrap();
    assert_eq!(config.template_root, PathBuf::from("/srv/tpl"));
    assert_eq!(config.static_root, PathBuf::from("/var/www"));
    assert_eq!(config.worker.queue_capacity, 7);
}

#[test]
fn test_defaults_without_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let config = ConfigLoader::load(None).unwrap();
    assert_eq!(config.render.extension, ".html");
    assert_eq!(config.worker.queue_capacity, 1024);
    assert_eq!(config.scheduler.min_interval_secs, 1);
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn test_page_refuses_invalid_config() {
    let site = Site::new(&[]);
    let mut config = site.config();
    config.worker.queue_capacity = 0;
    assert!(matches!(Page::new(config), Err(PageError::ConfigError(_))));

    let mut config = site.config();
    config.template_root = PathBuf::new();
    assert!(matches!(Page::new(config), Err(PageError::ConfigError(_))));
}

#[tokio::test]
async fn test_loaded_extension_shapes_output_names() {
    let site = Site::new(&[("a.tpl", "{{ v }}")]);
    let config_file = site.templates.path().join("tinypage.toml");
    std::fs::write(
        &config_file,
        format!(
            "template_root = {:?}\nstatic_root = {:?}\n\n[render]\nextension = \".htm\"\n",
            site.templates.path().display().to_string(),
            site.output.path().display().to_string()
        ),
    )
    .unwrap();

    let config = {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        ConfigLoader::load_from_file(&config_file).unwrap()
    };
    let page = Page::new(config).unwrap();
    page.submit_generation("a.tpl", "", "a", data(json!({"v": "x"})))
        .await
        .unwrap();
    page.shutdown().await;

    assert_eq!(site.read("a.htm"), "x");
}
