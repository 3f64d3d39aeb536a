//! Merge rules: defaults first, then file, then environment.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("template_root", "tpl")?
        .set_default("static_root", "html")?
        .set_default("render.extension", ".html")?
        .set_default("render.autoescape", true)?
        .set_default("worker.queue_capacity", 1024_i64)?
        .set_default("worker.drain_timeout_ms", 10_000_i64)?
        .set_default("scheduler.tick_ms", 1000_i64)?
        .set_default("scheduler.min_interval_secs", 1_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")
}
