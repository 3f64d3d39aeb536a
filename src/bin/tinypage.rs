//! Tinypage CLI Binary
//!
//! Renders pages through the same queue and worker an embedding application uses.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tinypage::config::{ConfigLoader, PageConfig};
use tinypage::logging::{init_logging, LoggingConfig};
use tinypage::{GenerationRequest, Page, PageData};
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "tinypage")]
#[command(about = "Render templates into static pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Template root (overrides config)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Static output root (overrides config)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single page
    Render {
        /// Template file, relative to the template root
        #[arg(long)]
        template: String,

        /// Output name without extension
        #[arg(long)]
        page: String,

        /// Subdirectory under the output root
        #[arg(long, default_value = "")]
        sub_dir: String,

        /// Template data as a non-empty JSON object
        #[arg(long)]
        data: String,

        /// Extra shared templates (layouts, macros); ones already in config are skipped
        #[arg(long)]
        shared: Vec<String>,
    },
    /// Render every entry of a JSON manifest: [{"template", "sub_dir", "page", "data"}]
    Batch {
        manifest: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&build_logging_config(&cli, &config.logging))) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(summary) => {
            info!("Command completed successfully");
            println!("{}", summary);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<PageConfig> {
    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(ref templates) = cli.templates {
        config.template_root = templates.clone();
    }
    if let Some(ref output) = cli.output {
        config.static_root = output.clone();
    }
    config.ensure_valid()?;
    Ok(config)
}

/// CLI flags override the config file. Logs go to stderr unless configured otherwise,
/// keeping stdout for results.
fn build_logging_config(cli: &Cli, base: &LoggingConfig) -> LoggingConfig {
    let mut config = base.clone();
    if config.output == "stdout" {
        config.output = "stderr".to_string();
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    config
}

async fn run(command: Commands, config: PageConfig) -> Result<String> {
    match command {
        Commands::Render {
            template,
            page: page_name,
            sub_dir,
            data,
            shared,
        } => {
            let data = parse_data(&data)?;
            let page = Page::new(config)?;
            add_shared_templates(&page, &shared)?;
            let path = page.output_path(&sub_dir, &page_name);

            page.submit_generation(&template, &sub_dir, &page_name, data)
                .await?;
            page.shutdown().await;

            if page.stats().completed != 1 {
                bail!("Generating '{}' from '{}' failed, see log", page_name, template);
            }
            Ok(path.display().to_string())
        }
        Commands::Batch { manifest } => {
            let raw = std::fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let requests: Vec<GenerationRequest> =
                serde_json::from_str(&raw).context("Manifest is not a list of requests")?;

            let page = Page::new(config)?;
            let submitter = page.submitter();
            let mut rejected = 0usize;
            for request in requests {
                let name = request.page.clone();
                if let Err(e) = submitter.submit(request).await {
                    error!(page = %name, error = %e, "Rejected manifest entry");
                    rejected += 1;
                }
            }
            page.shutdown().await;

            let stats = page.stats();
            Ok(format!(
                "completed {}, failed {}, rejected {}, discarded {}",
                stats.completed, stats.failed, rejected, stats.discarded
            ))
        }
    }
}

/// Add `--shared` templates, skipping any already loaded from config.
fn add_shared_templates(page: &Page, shared: &[String]) -> Result<()> {
    for template in shared {
        if page.renderer().shared_templates().contains(template) {
            debug!(template = %template, "Shared template already loaded");
            continue;
        }
        page.add_shared_template(template)?;
    }
    Ok(())
}

fn parse_data(raw: &str) -> Result<PageData> {
    let value: serde_json::Value = serde_json::from_str(raw).context("--data is not valid JSON")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("--data must be a JSON object"),
    }
}
