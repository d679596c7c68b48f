// src/scheduler.rs

//! Public scheduler facade: register tasks, validate the graph, run it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::engine::retry::RetryPolicy;
use crate::engine::runtime::{RunSummary, Runtime};
use crate::errors::{Error, Result};
use crate::graph::registry::TaskRegistry;
use crate::graph::task::{TaskSpec, TaskStatus};

/// Knobs for a scheduler instance.
pub struct SchedulerOptions {
    /// Number of concurrent workers. Defaults to the number of available
    /// cores; clamped to at least 1.
    pub workers: usize,
    pub retry: RetryPolicy,
    /// Time source for registration stamps and retry due-times. Swapped out
    /// in tests so backoff logic never sleeps in wall-clock time.
    pub clock: Arc<dyn Clock>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// A dependency-aware, priority-ordered task scheduler.
///
/// Usage follows a strict order: register every task, [`validate`] the graph
/// once, then [`run`] it. The whole task set belongs to one run; build a new
/// scheduler for the next run.
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdag::{FnWork, Scheduler, SchedulerOptions, TaskSpec};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let mut sched = Scheduler::new(SchedulerOptions::default());
/// sched.register(TaskSpec::new("fetch", Arc::new(FnWork::new(|| Ok(())))))?;
/// sched.register(
///     TaskSpec::new("build", Arc::new(FnWork::new(|| Ok(()))))
///         .priority(10)
///         .after(["fetch"])
///         .max_retries(3),
/// )?;
/// sched.validate()?;
/// let summary = sched.run().await?;
/// assert_eq!(summary.completed, ["fetch", "build"]);
/// # Ok(())
/// # }
/// ```
///
/// [`validate`]: Scheduler::validate
/// [`run`]: Scheduler::run
pub struct Scheduler {
    registry: TaskRegistry,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            registry: TaskRegistry::new(),
            options,
        }
    }

    /// Register a task. Fails on duplicate names and self-dependencies;
    /// forward references to not-yet-registered dependencies are fine until
    /// [`Scheduler::validate`].
    pub fn register(&mut self, spec: TaskSpec) -> Result<()> {
        let now = self.options.clock.now();
        self.registry.register(spec, now)
    }

    /// Check the whole graph: dependencies must exist and form a DAG.
    ///
    /// Must pass once after the final registration and before [`Scheduler::run`].
    /// Idempotent on an unchanged graph.
    pub fn validate(&mut self) -> Result<()> {
        self.registry.validate()
    }

    /// Current status of a registered task.
    pub fn status(&self, name: &str) -> Result<TaskStatus> {
        self.registry.status(name)
    }

    /// Execute the graph to completion.
    ///
    /// Errors only on pre-flight problems (graph never validated, or empty);
    /// per-task failures, blocked tasks, and retries are reported in the
    /// [`RunSummary`], never as an error of the run itself.
    pub async fn run(self) -> Result<RunSummary> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(cancel_rx).await
    }

    /// Like [`Scheduler::run`], but stops dequeuing new tasks once `true` is
    /// observed on the channel. In-flight work finishes; all non-terminal
    /// tasks are reported as cancelled.
    pub async fn run_with_cancel(self, cancel_rx: watch::Receiver<bool>) -> Result<RunSummary> {
        if !self.registry.is_validated() {
            return Err(Error::NotValidated);
        }
        if self.registry.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let runtime = Runtime::new(
            self.registry,
            self.options.workers,
            self.options.retry,
            self.options.clock,
        );
        Ok(runtime.run(cancel_rx).await)
    }
}
