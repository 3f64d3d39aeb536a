//! Page Facade
//!
//! The entry point embedding applications use. `Page` owns one renderer, one
//! generation worker and one auto-gen scheduler, and forwards to them.

use crate::clock::{Clock, SystemClock};
use crate::config::PageConfig;
use crate::error::PageError;
use crate::render::{Renderer, TemplateFunction, TemplateRenderer};
use crate::scheduler::AutoGenScheduler;
use crate::types::{GenerationRequest, PageData};
use crate::worker::{GenerationWorker, Submitter, WorkerStats};
use crate::writer::{StaticWriter, Writer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Static page generation service.
///
/// Must be created inside a tokio runtime; both background loops are spawned on it.
pub struct Page {
    renderer: Arc<TemplateRenderer>,
    writer: Arc<StaticWriter>,
    worker: GenerationWorker,
    scheduler: AutoGenScheduler,
}

impl Page {
    pub fn new(config: PageConfig) -> Result<Self, PageError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build with a custom clock for the scheduler.
    pub fn with_clock(config: PageConfig, clock: Arc<dyn Clock>) -> Result<Self, PageError> {
        config.ensure_valid()?;

        let renderer = Arc::new(TemplateRenderer::new(
            config.template_root.clone(),
            &config.render,
        )?);
        let writer = Arc::new(StaticWriter::new(
            config.static_root.clone(),
            config.render.extension.clone(),
        ));
        let worker = GenerationWorker::spawn(
            Arc::clone(&renderer) as Arc<dyn Renderer>,
            Arc::clone(&writer) as Arc<dyn Writer>,
            config.worker.clone(),
        );
        let scheduler = AutoGenScheduler::spawn(config.scheduler.clone(), clock);

        info!(
            template_root = %config.template_root.display(),
            static_root = %config.static_root.display(),
            "Page service started"
        );

        Ok(Self {
            renderer,
            writer,
            worker,
            scheduler,
        })
    }

    /// Queue a page for generation, waiting for queue capacity if needed.
    pub async fn submit_generation(
        &self,
        template: &str,
        sub_dir: &str,
        page: &str,
        data: PageData,
    ) -> Result<(), PageError> {
        self.worker
            .submit(GenerationRequest::new(template, sub_dir, page, data))
            .await
    }

    /// Queue a page for generation, failing with [`PageError::QueueFull`] instead of waiting.
    pub fn try_submit_generation(
        &self,
        template: &str,
        sub_dir: &str,
        page: &str,
        data: PageData,
    ) -> Result<(), PageError> {
        self.worker
            .try_submit(GenerationRequest::new(template, sub_dir, page, data))
    }

    /// A cloneable handle for enqueueing from elsewhere, e.g. inside auto-gen callbacks.
    pub fn submitter(&self) -> Submitter {
        self.worker.submitter()
    }

    /// Register a periodic task that fires at most once per `interval_secs`.
    pub fn register_auto_task<F>(
        &self,
        tag: &str,
        interval_secs: u64,
        callback: F,
    ) -> Result<(), PageError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.scheduler.register(tag, interval_secs, Arc::new(callback))
    }

    /// Replace the interval and callback of a registered task.
    pub fn update_auto_task<F>(
        &self,
        tag: &str,
        interval_secs: u64,
        callback: F,
    ) -> Result<(), PageError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.scheduler.update(tag, interval_secs, Arc::new(callback))
    }

    /// Set the callback run after each page is written. Only the first call succeeds.
    pub fn set_completion_callback<F>(&self, callback: F) -> Result<(), PageError>
    where
        F: Fn(&str, &[u8]) -> bool + Send + Sync + 'static,
    {
        self.worker.set_completion_callback(Arc::new(callback))
    }

    /// Make a helper available to templates under `name`.
    pub fn add_ext_func<F>(&self, name: &str, function: F) -> Result<(), PageError>
    where
        F: TemplateFunction + 'static,
    {
        self.renderer.add_function(name, Arc::new(function))
    }

    pub fn add_shared_template(&self, template: &str) -> Result<(), PageError> {
        self.renderer.add_shared_template(template)
    }

    pub fn reset_shared_templates(&self) {
        self.renderer.reset_shared_templates();
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn scheduler(&self) -> &AutoGenScheduler {
        &self.scheduler
    }

    /// Where a page will be written.
    pub fn output_path(&self, sub_dir: &str, page: &str) -> PathBuf {
        self.writer.output_path(Some(sub_dir), page)
    }

    pub fn static_root(&self) -> &Path {
        self.writer.static_root()
    }

    pub fn stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    /// Stop both loops. Queued pages are drained within the configured deadline.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.worker.shutdown().await;
        info!(stats = ?self.worker.stats(), "Page service stopped");
    }
}
