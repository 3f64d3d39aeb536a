//! Page Generation Worker
//!
//! A bounded FIFO queue of [`GenerationRequest`]s consumed by exactly one background
//! task. Requests are processed strictly one at a time: render, persist, read back,
//! then hand the bytes to the completion callback.
//!
//! Shutdown drains: once signalled, the queue is closed to new requests and whatever
//! is already queued is processed until the queue is empty or the drain deadline
//! passes. Requests left at the deadline are discarded and counted. A request that
//! has started is never aborted.
//!
//! Collaborator calls have no timeout. A renderer, writer or callback that hangs
//! stalls the worker.

use crate::error::PageError;
use crate::lifecycle::{Lifecycle, LoopHandle, LoopState};
use crate::render::Renderer;
use crate::types::{CompletionCallback, GenerationRequest};
use crate::writer::Writer;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Configuration for the generation worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum queued requests before submitters wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound on draining queued requests at shutdown (milliseconds)
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_drain_timeout_ms() -> u64 {
    10_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Worker statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Requests accepted into the queue
    pub submitted: usize,
    /// Pages written and read back
    pub completed: usize,
    /// Requests dropped after a render, I/O or internal failure
    pub failed: usize,
    /// Requests still queued when the drain deadline passed
    pub discarded: usize,
}

impl WorkerStats {
    /// Requests accepted but not yet finished
    pub fn pending(&self) -> usize {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.discarded)
    }
}

/// Cloneable producer side of the queue.
///
/// Hand one to code that needs to enqueue pages, such as an auto-gen callback.
#[derive(Clone)]
pub struct Submitter {
    sender: mpsc::Sender<GenerationRequest>,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<RwLock<WorkerStats>>,
}

impl Submitter {
    /// Enqueue a request, waiting for queue capacity if the queue is full.
    pub async fn submit(&self, request: GenerationRequest) -> Result<(), PageError> {
        self.admit(&request)?;
        let page = request.page.clone();
        self.sender
            .send(request)
            .await
            .map_err(|_| PageError::ShutDown)?;
        self.record_submitted(&page);
        Ok(())
    }

    /// Enqueue a request or fail immediately with [`PageError::QueueFull`].
    pub fn try_submit(&self, request: GenerationRequest) -> Result<(), PageError> {
        self.admit(&request)?;
        let page = request.page.clone();
        match self.sender.try_send(request) {
            Ok(()) => {
                self.record_submitted(&page);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(page = %page, "Generation queue is full, rejecting request");
                Err(PageError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(PageError::ShutDown),
        }
    }

    /// Enqueue from synchronous code, blocking the thread while the queue is full.
    ///
    /// Must not be called from an async context; auto-gen callbacks run on the
    /// blocking pool and may use it.
    pub fn blocking_submit(&self, request: GenerationRequest) -> Result<(), PageError> {
        self.admit(&request)?;
        let page = request.page.clone();
        self.sender
            .blocking_send(request)
            .map_err(|_| PageError::ShutDown)?;
        self.record_submitted(&page);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn admit(&self, request: &GenerationRequest) -> Result<(), PageError> {
        request.validate()?;
        if !self.lifecycle.is_running() {
            return Err(PageError::ShutDown);
        }
        Ok(())
    }

    fn record_submitted(&self, page: &str) {
        let pending = {
            let mut stats = self.stats.write();
            stats.submitted += 1;
            stats.pending()
        };
        debug!(page, pending, "Enqueued generation request");
    }
}

/// Everything one unit of work needs, shared with the blocking pool.
#[derive(Clone)]
struct PipelineContext {
    renderer: Arc<dyn Renderer>,
    writer: Arc<dyn Writer>,
    completion: Arc<OnceLock<CompletionCallback>>,
    stats: Arc<RwLock<WorkerStats>>,
}

/// The single serialized generation worker.
pub struct GenerationWorker {
    submitter: Submitter,
    completion: Arc<OnceLock<CompletionCallback>>,
    lifecycle: Arc<Lifecycle>,
    handle: LoopHandle,
}

impl GenerationWorker {
    /// Spawn the worker loop onto the current tokio runtime.
    pub fn spawn(
        renderer: Arc<dyn Renderer>,
        writer: Arc<dyn Writer>,
        config: WorkerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (signal_tx, signal_rx) = oneshot::channel();
        let lifecycle = Arc::new(Lifecycle::new("generation-worker"));
        let stats = Arc::new(RwLock::new(WorkerStats::default()));
        let completion = Arc::new(OnceLock::new());

        let context = PipelineContext {
            renderer,
            writer,
            completion: Arc::clone(&completion),
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(Self::worker_loop(
            receiver,
            signal_rx,
            context,
            Arc::clone(&lifecycle),
            config.drain_timeout(),
        ));

        info!(
            queue_capacity = config.queue_capacity,
            drain_timeout_ms = config.drain_timeout_ms,
            "Started generation worker"
        );

        Self {
            submitter: Submitter {
                sender,
                lifecycle: Arc::clone(&lifecycle),
                stats,
            },
            completion,
            lifecycle,
            handle: LoopHandle::new(signal_tx, task),
        }
    }

    pub async fn submit(&self, request: GenerationRequest) -> Result<(), PageError> {
        self.submitter.submit(request).await
    }

    pub fn try_submit(&self, request: GenerationRequest) -> Result<(), PageError> {
        self.submitter.try_submit(request)
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Set the completion callback. Only the first call succeeds.
    pub fn set_completion_callback(&self, callback: CompletionCallback) -> Result<(), PageError> {
        self.completion
            .set(callback)
            .map_err(|_| PageError::CallbackAlreadySet)
    }

    pub fn stats(&self) -> WorkerStats {
        self.submitter.stats.read().clone()
    }

    pub fn state(&self) -> LoopState {
        self.lifecycle.state()
    }

    /// Stop accepting requests, drain the queue and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.handle.shutdown(&self.lifecycle).await;
    }

    async fn worker_loop(
        mut receiver: mpsc::Receiver<GenerationRequest>,
        mut signal: oneshot::Receiver<()>,
        context: PipelineContext,
        lifecycle: Arc<Lifecycle>,
        drain_timeout: Duration,
    ) {
        debug!("Generation worker started");

        loop {
            tokio::select! {
                biased;
                // A dropped sender counts as a stop signal too.
                _ = &mut signal => break,
                next = receiver.recv() => match next {
                    Some(request) => context.process(request).await,
                    None => break,
                },
            }
        }

        lifecycle.begin_shutdown();
        receiver.close();

        let deadline = Instant::now() + drain_timeout;
        let mut drained = 0usize;
        while let Some(request) = receiver.recv().await {
            if Instant::now() >= deadline {
                let mut discarded = 1;
                while receiver.try_recv().is_ok() {
                    discarded += 1;
                }
                context.stats.write().discarded += discarded;
                warn!(
                    discarded,
                    first_discarded = %request.page,
                    "Drain deadline reached, discarding queued requests"
                );
                break;
            }
            context.process(request).await;
            drained += 1;
        }

        lifecycle.mark_stopped();
        info!(drained, "Stopped generation worker");
    }
}

impl PipelineContext {
    /// Run one request to completion. Never fails the loop.
    async fn process(&self, request: GenerationRequest) {
        let started = Instant::now();
        let page = request.page.clone();
        let template = request.template.clone();
        let unit = self.clone();

        let outcome = tokio::task::spawn_blocking(move || unit.generate(&request)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(join_error) => Err(PageError::InternalFault(join_error.to_string())),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(bytes) => {
                self.stats.write().completed += 1;
                info!(page = %page, template = %template, bytes, elapsed_ms, "Generated page");
            }
            Err(e) => {
                self.stats.write().failed += 1;
                error!(
                    page = %page,
                    template = %template,
                    elapsed_ms,
                    error = %e,
                    "Page generation failed, dropping request"
                );
            }
        }
    }

    /// Render, persist, read back and notify. Runs on the blocking pool.
    fn generate(&self, request: &GenerationRequest) -> Result<usize, PageError> {
        let sub_dir = request.sub_dir();
        let rendered =
            self.renderer
                .render(&request.template, sub_dir, &request.page, &request.data)?;
        self.writer.persist(sub_dir, &request.page, &rendered)?;
        let bytes = self.writer.read_back(sub_dir, &request.page)?;

        if let Some(callback) = self.completion.get() {
            let accepted = callback(&request.page, &bytes);
            if !accepted {
                debug!(page = %request.page, "Completion callback declined page");
            }
        }
        Ok(bytes.len())
    }
}
