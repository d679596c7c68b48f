// src/engine/runtime.rs

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Permit};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::engine::delay_queue::DelayQueue;
use crate::engine::ready_queue::{ReadyEntry, ReadyQueue};
use crate::engine::retry::{RetryDecision, RetryPolicy};
use crate::graph::registry::TaskRegistry;
use crate::graph::resolver;
use crate::graph::task::{Runnable, TaskName, TaskStatus};

/// Final outcome of a run, grouped by how each task ended.
///
/// - `completed` / `failed` are in completion/failure order.
/// - `blocked` tasks never ran because a dependency permanently failed;
///   `cancelled` tasks were non-terminal when the run was cancelled.
///   Both are in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    pub blocked: Vec<TaskName>,
    pub cancelled: Vec<TaskName>,
}

impl RunSummary {
    /// True when every registered task completed.
    pub fn all_completed(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty() && self.cancelled.is_empty()
    }
}

/// A unit of work handed to the worker pool.
struct WorkerJob {
    name: TaskName,
    work: Arc<dyn Runnable>,
}

/// Completion report sent back from a worker.
struct WorkerEvent {
    task: TaskName,
    result: anyhow::Result<()>,
}

/// Bounded pool of worker tasks pulling jobs from a shared channel.
///
/// Workers exit when the job channel closes; `join` waits for in-flight
/// work to finish.
struct WorkerPool {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn(
        n: usize,
        jobs: Arc<Mutex<mpsc::Receiver<WorkerJob>>>,
        events_tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let jobs = Arc::clone(&jobs);
            let events_tx = events_tx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, jobs, events_tx).await;
            }));
        }
        Self { joins }
    }

    async fn join(self) {
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<WorkerJob>>>,
    events_tx: mpsc::Sender<WorkerEvent>,
) {
    loop {
        // Only one worker can hold the receiver at a time; the lock is
        // released before the (potentially long) work execution.
        let job = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            // Channel closed: the run is over.
            break;
        };

        debug!(worker = worker_id, task = %job.name, "worker picked up task");
        let result = job.work.execute().await;

        if events_tx
            .send(WorkerEvent {
                task: job.name,
                result,
            })
            .await
            .is_err()
        {
            break;
        }
    }
}

/// The execution engine: owns all mutable scheduler state and drives it from
/// a single event loop.
///
/// The loop reacts to worker completions, retry timers becoming due, dispatch
/// capacity opening up, and the cancellation signal. Task `work()` runs on the
/// worker pool, outside this loop, so long-running work never blocks
/// scheduling decisions.
pub(crate) struct Runtime {
    registry: TaskRegistry,
    ready: ReadyQueue,
    delayed: DelayQueue,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    workers: usize,

    running: usize,
    cancelled: bool,
    completed: Vec<TaskName>,
    failed: Vec<TaskName>,
    blocked: HashSet<TaskName>,
}

impl Runtime {
    pub(crate) fn new(
        registry: TaskRegistry,
        workers: usize,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            ready: ReadyQueue::new(),
            delayed: DelayQueue::new(),
            retry,
            clock,
            workers: workers.max(1),
            running: 0,
            cancelled: false,
            completed: Vec::new(),
            failed: Vec::new(),
            blocked: HashSet::new(),
        }
    }

    /// Main event loop.
    ///
    /// Drains the ready queue until it is empty, no retry is pending, and no
    /// task is running (or, after cancellation, until in-flight work has
    /// finished). Per-task problems never abort the run; they end up in the
    /// summary.
    pub(crate) async fn run(mut self, mut cancel_rx: watch::Receiver<bool>) -> RunSummary {
        info!(
            workers = self.workers,
            tasks = self.registry.len(),
            "taskdag runtime started"
        );

        // Capacity-1 job channel: the highest-priority ready task is popped
        // only once a worker slot is (about to be) free, so late-arriving
        // higher-priority tasks are not stuck behind a dispatch backlog.
        let (job_tx, job_rx) = mpsc::channel::<WorkerJob>(1);
        let (events_tx, mut events_rx) = mpsc::channel::<WorkerEvent>(64);
        let pool = WorkerPool::spawn(self.workers, Arc::new(Mutex::new(job_rx)), events_tx);

        for name in resolver::initial_ready(&mut self.registry) {
            self.enqueue_ready(&name);
        }

        let mut cancel_closed = false;
        loop {
            self.promote_due();
            if self.finished() {
                break;
            }

            // Computed before the select so its branches borrow locals only.
            let next_wait = self
                .delayed
                .next_due()
                .map(|due| due.saturating_duration_since(self.clock.now()));
            let can_dispatch = !self.ready.is_empty() && !self.cancelled;
            let watch_cancel = !self.cancelled && !cancel_closed;

            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_finished(event.task, event.result),
                        None => {
                            error!("worker event channel closed unexpectedly");
                            break;
                        }
                    }
                }
                changed = cancel_rx.changed(), if watch_cancel => {
                    match changed {
                        Ok(()) => {
                            if *cancel_rx.borrow() {
                                self.handle_cancel();
                            }
                        }
                        // Sender dropped without cancelling; stop watching.
                        Err(_) => cancel_closed = true,
                    }
                }
                _ = tokio::time::sleep(next_wait.unwrap_or_default()), if next_wait.is_some() && !self.cancelled => {
                    // Loop re-enters promote_due() at the top.
                }
                permit = job_tx.reserve(), if can_dispatch => {
                    match permit {
                        Ok(permit) => self.dispatch(permit),
                        Err(_) => {
                            error!("worker job channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        // Closing the job channel tells the workers to exit once idle.
        drop(job_tx);
        pool.join().await;

        info!("taskdag runtime exiting");
        self.into_summary()
    }

    /// Pop the best ready task and hand it to a waiting worker.
    fn dispatch(&mut self, permit: Permit<'_, WorkerJob>) {
        let Some(entry) = self.ready.pop() else {
            return;
        };

        let attempt = match self.registry.begin_attempt(&entry.name) {
            Ok(attempt) => attempt,
            Err(err) => {
                debug_assert!(false, "dispatch of non-ready task: {err}");
                error!(error = %err, "refusing to dispatch task");
                return;
            }
        };

        let work = match self.registry.get(&entry.name) {
            Ok(record) => Arc::clone(&record.work),
            Err(err) => {
                error!(error = %err, "task vanished between pop and dispatch");
                return;
            }
        };

        debug!(task = %entry.name, attempt, priority = entry.priority, "dispatching task");
        self.running += 1;
        permit.send(WorkerJob {
            name: entry.name,
            work,
        });
    }

    fn handle_finished(&mut self, task: TaskName, result: anyhow::Result<()>) {
        self.running -= 1;

        match result {
            Ok(()) => {
                info!(task = %task, "task completed successfully");
                if !self.transition(&task, TaskStatus::Completed) {
                    return;
                }
                self.completed.push(task.clone());
                for name in resolver::newly_ready(&mut self.registry, &task) {
                    self.enqueue_ready(&name);
                }
            }
            Err(err) => self.handle_failure(task, err),
        }
    }

    fn handle_failure(&mut self, task: TaskName, err: anyhow::Error) {
        if let Err(e) = self.registry.record_error(&task, format!("{err:#}")) {
            error!(error = %e, "failed task is not in the registry");
            return;
        }

        let (attempts, max_retries) = match self.registry.get(&task) {
            Ok(record) => (record.attempts, record.max_retries),
            Err(_) => return,
        };

        match self.retry.decide(attempts, max_retries) {
            RetryDecision::Retry(delay) => {
                warn!(
                    task = %task,
                    error = %err,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "task failed; retry scheduled"
                );
                if self.transition(&task, TaskStatus::Pending) {
                    let seq = self.registry.get(&task).map(|r| r.seq).unwrap_or(0);
                    self.delayed.schedule(task, seq, self.clock.now() + delay);
                }
            }
            RetryDecision::GiveUp => {
                warn!(
                    task = %task,
                    error = %err,
                    attempts,
                    "task failed permanently; retries exhausted"
                );
                if !self.transition(&task, TaskStatus::Failed) {
                    return;
                }
                self.failed.push(task.clone());
                for name in resolver::blocked_subgraph(&self.registry, &task) {
                    self.blocked.insert(name);
                }
            }
        }
    }

    fn handle_cancel(&mut self) {
        info!("cancellation requested; in-flight tasks will finish, nothing new starts");
        self.cancelled = true;

        // Scheduled retries are abandoned; the tasks stay `Pending` and are
        // reported as cancelled in the summary.
        let abandoned = self.delayed.drain();
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "abandoned scheduled retries");
        }
    }

    /// Move due retries back through `Ready` into the ready queue.
    fn promote_due(&mut self) {
        let now = self.clock.now();
        for name in self.delayed.pop_due(now) {
            debug!(task = %name, "retry delay elapsed; task ready again");
            if self.transition(&name, TaskStatus::Ready) {
                self.enqueue_ready(&name);
            }
        }
    }

    /// Push a task into the ready queue. The queue must never hold a task
    /// whose status is not `Ready`, so the status is checked at push time.
    fn enqueue_ready(&mut self, name: &str) {
        match self.registry.get(name) {
            Ok(record) if record.status == TaskStatus::Ready => {
                self.ready.push(ReadyEntry {
                    name: record.name.clone(),
                    priority: record.priority,
                    seq: record.seq,
                });
            }
            Ok(record) => {
                debug_assert!(false, "enqueue of non-ready task '{name}'");
                error!(task = %name, status = %record.status, "refusing to enqueue task that is not ready");
            }
            Err(err) => {
                error!(error = %err, "refusing to enqueue unknown task");
            }
        }
    }

    /// Apply a status transition, treating refusal as an internal invariant
    /// breach: fatal in debug builds, logged and skipped in release so the
    /// registry's state table is never corrupted.
    fn transition(&mut self, name: &str, to: TaskStatus) -> bool {
        match self.registry.set_status(name, to) {
            Ok(()) => true,
            Err(err) => {
                debug_assert!(false, "illegal transition: {err}");
                error!(error = %err, "refusing illegal status transition");
                false
            }
        }
    }

    fn finished(&self) -> bool {
        if self.cancelled {
            self.running == 0
        } else {
            self.running == 0 && self.ready.is_empty() && self.delayed.is_empty()
        }
    }

    fn into_summary(self) -> RunSummary {
        let mut summary = RunSummary {
            completed: self.completed,
            failed: self.failed,
            ..RunSummary::default()
        };

        // Everything still non-terminal either sits behind a failed
        // dependency or was abandoned by cancellation. "Blocked" is the more
        // specific outcome and wins when both apply.
        for name in self.registry.names() {
            let terminal = self
                .registry
                .status(name)
                .map(TaskStatus::is_terminal)
                .unwrap_or(false);
            if terminal {
                continue;
            }
            if self.blocked.contains(name) || !self.cancelled {
                summary.blocked.push(name.to_string());
            } else {
                summary.cancelled.push(name.to_string());
            }
        }
        summary
    }
}
