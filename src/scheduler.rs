//! Auto-Gen Scheduler
//!
//! Periodic, rate-limited re-generation. One background task wakes on a fixed
//! tick and walks every registered task in tag order; a task fires when at least
//! its own interval has passed since it last fired (or since registration).
//!
//! Evaluation is sequential: a slow callback delays the tasks after it in the same
//! tick. Callbacks run on the blocking pool and are awaited one at a time.

use crate::clock::Clock;
use crate::error::PageError;
use crate::lifecycle::{Lifecycle, LoopHandle, LoopState};
use crate::types::AutoGenCallback;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the auto-gen scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Shared wake-up period of the scheduler loop (milliseconds)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Floor applied to every task interval (seconds)
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_min_interval_secs() -> u64 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            min_interval_secs: default_min_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Requested intervals below the floor are raised to it.
pub fn effective_interval(requested_secs: u64, floor_secs: u64) -> u64 {
    requested_secs.max(floor_secs)
}

#[derive(Clone)]
struct AutoGenTask {
    min_interval_secs: u64,
    callback: AutoGenCallback,
}

/// Task table and last-fired bookkeeping, shared with the loop.
struct TaskTable {
    tasks: RwLock<BTreeMap<String, AutoGenTask>>,
    last_fired: RwLock<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
    floor_secs: u64,
}

impl TaskTable {
    /// Evaluate every task once against a single `now`. Returns how many fired.
    async fn run_tick(&self) -> usize {
        let now = self.clock.now_unix();
        let snapshot: Vec<(String, AutoGenTask)> = self
            .tasks
            .read()
            .iter()
            .map(|(tag, task)| (tag.clone(), task.clone()))
            .collect();

        let mut fired = 0;
        for (tag, task) in snapshot {
            let last = self.last_fired.read().get(&tag).copied();
            let Some(last) = last else {
                debug!(tag = %tag, "No last-fired time, skipping");
                continue;
            };
            let elapsed = now.saturating_sub(last);
            // A clock that stepped backwards never makes a task due.
            let due = u64::try_from(elapsed).is_ok_and(|secs| secs >= task.min_interval_secs);
            if !due {
                continue;
            }

            let callback = Arc::clone(&task.callback);
            match tokio::task::spawn_blocking(move || callback()).await {
                Ok(()) => info!(tag = %tag, elapsed, "Fired auto-gen task"),
                Err(e) => error!(
                    tag = %tag,
                    error = %PageError::InternalFault(e.to_string()),
                    "Auto-gen task faulted"
                ),
            }
            // Stamped even after a fault so a failing task keeps its interval.
            self.last_fired.write().insert(tag, now);
            fired += 1;
        }
        fired
    }
}

/// Owns the task table and the scheduler loop.
pub struct AutoGenScheduler {
    table: Arc<TaskTable>,
    lifecycle: Arc<Lifecycle>,
    handle: LoopHandle,
}

impl AutoGenScheduler {
    /// Spawn the scheduler loop onto the current tokio runtime.
    pub fn spawn(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let table = Arc::new(TaskTable {
            tasks: RwLock::new(BTreeMap::new()),
            last_fired: RwLock::new(HashMap::new()),
            clock,
            floor_secs: config.min_interval_secs,
        });
        let lifecycle = Arc::new(Lifecycle::new("auto-gen-scheduler"));
        let (signal_tx, signal_rx) = oneshot::channel();
        let task = tokio::spawn(Self::scheduler_loop(
            Arc::clone(&table),
            signal_rx,
            Arc::clone(&lifecycle),
            config.tick(),
        ));

        info!(
            tick_ms = config.tick_ms,
            min_interval_secs = config.min_interval_secs,
            "Started auto-gen scheduler"
        );

        Self {
            table,
            lifecycle,
            handle: LoopHandle::new(signal_tx, task),
        }
    }

    /// Register a periodic task. The first fire comes no sooner than one interval
    /// after registration. Tags are unique; use [`update`](Self::update) to change one.
    pub fn register(
        &self,
        tag: &str,
        interval_secs: u64,
        callback: AutoGenCallback,
    ) -> Result<(), PageError> {
        self.check_accepting(tag)?;
        let min_interval_secs = effective_interval(interval_secs, self.table.floor_secs);
        {
            let mut tasks = self.table.tasks.write();
            if tasks.contains_key(tag) {
                return Err(PageError::DuplicateTask(tag.to_string()));
            }
            tasks.insert(
                tag.to_string(),
                AutoGenTask {
                    min_interval_secs,
                    callback,
                },
            );
            self.table
                .last_fired
                .write()
                .insert(tag.to_string(), self.table.clock.now_unix());
        }
        debug!(tag, requested = interval_secs, min_interval_secs, "Registered auto-gen task");
        Ok(())
    }

    /// Replace the interval and callback of an existing task. Its last-fired time is kept.
    pub fn update(
        &self,
        tag: &str,
        interval_secs: u64,
        callback: AutoGenCallback,
    ) -> Result<(), PageError> {
        self.check_accepting(tag)?;
        let min_interval_secs = effective_interval(interval_secs, self.table.floor_secs);
        let mut tasks = self.table.tasks.write();
        let task = tasks
            .get_mut(tag)
            .ok_or_else(|| PageError::TaskNotFound(tag.to_string()))?;
        task.min_interval_secs = min_interval_secs;
        task.callback = callback;
        debug!(tag, min_interval_secs, "Updated auto-gen task");
        Ok(())
    }

    pub fn last_fired(&self, tag: &str) -> Option<i64> {
        self.table.last_fired.read().get(tag).copied()
    }

    pub fn interval(&self, tag: &str) -> Option<u64> {
        self.table
            .tasks
            .read()
            .get(tag)
            .map(|task| task.min_interval_secs)
    }

    pub fn tags(&self) -> Vec<String> {
        self.table.tasks.read().keys().cloned().collect()
    }

    pub fn state(&self) -> LoopState {
        self.lifecycle.state()
    }

    /// Stop the loop after the tick in progress, then wait for it.
    pub async fn shutdown(&self) {
        self.handle.shutdown(&self.lifecycle).await;
    }

    fn check_accepting(&self, tag: &str) -> Result<(), PageError> {
        if tag.trim().is_empty() {
            return Err(PageError::Validation("task tag is required".to_string()));
        }
        if !self.lifecycle.is_running() {
            return Err(PageError::ShutDown);
        }
        Ok(())
    }

    async fn scheduler_loop(
        table: Arc<TaskTable>,
        mut signal: oneshot::Receiver<()>,
        lifecycle: Arc<Lifecycle>,
        tick: Duration,
    ) {
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Auto-gen scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = &mut signal => break,
                _ = ticker.tick() => {
                    let fired = table.run_tick().await;
                    if fired > 0 {
                        debug!(fired, "Auto-gen tick complete");
                    }
                }
            }
        }

        lifecycle.begin_shutdown();
        lifecycle.mark_stopped();
        info!("Stopped auto-gen scheduler");
    }
}
