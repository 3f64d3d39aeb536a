//! Loop Lifecycle
//!
//! Both background loops share one state machine: `Running` → `Draining` → `Stopped`.
//! The transition is one-way; a stopped loop is never restarted.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Observable state of a background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    Stopped,
}

impl LoopState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LoopState::Running,
            1 => LoopState::Draining,
            _ => LoopState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::Running => 0,
            LoopState::Draining => 1,
            LoopState::Stopped => 2,
        }
    }
}

/// Lock-free state cell shared between a loop and its handle.
#[derive(Debug)]
pub struct Lifecycle {
    name: &'static str,
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(LoopState::Running.as_u8()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Move `Running` → `Draining`. Returns false if shutdown had already begun.
    pub fn begin_shutdown(&self) -> bool {
        self.state
            .compare_exchange(
                LoopState::Running.as_u8(),
                LoopState::Draining.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn mark_stopped(&self) {
        self.state.store(LoopState::Stopped.as_u8(), Ordering::Release);
        debug!(component = self.name, "Loop stopped");
    }
}

/// Owner-side handle of a spawned loop: its one-shot stop signal and its task.
pub(crate) struct LoopHandle {
    signal: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LoopHandle {
    pub(crate) fn new(signal: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            signal: Mutex::new(Some(signal)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Signal the loop and wait for it to exit. Safe to call more than once.
    pub(crate) async fn shutdown(&self, lifecycle: &Lifecycle) {
        if lifecycle.begin_shutdown() {
            debug!(component = lifecycle.name(), "Shutdown requested");
        }
        if let Some(signal) = self.signal.lock().take() {
            // The loop may already have exited on its own; nothing to signal then.
            let _ = signal.send(());
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(
                    component = lifecycle.name(),
                    error = %e,
                    "Background loop terminated abnormally"
                );
                lifecycle.mark_stopped();
            }
        }
    }
}
