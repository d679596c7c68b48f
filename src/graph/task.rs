// src/graph/task.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

/// Public type alias for task names throughout the crate.
pub type TaskName = String;

/// The executable body of a task.
///
/// Implementations may be closures (see [`FnWork`]), shell commands
/// (`exec::CommandWork`), or any concrete type. The engine invokes
/// `execute` at most once per attempt, always outside its own state lock,
/// so long-running work never stalls scheduling of unrelated tasks.
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn execute(&self) -> anyhow::Result<()>;
}

/// Adapter that lets a plain closure act as task work.
///
/// ```
/// use taskdag::graph::task::FnWork;
/// let work = FnWork::new(|| Ok(()));
/// ```
pub struct FnWork<F>(F);

impl<F> FnWork<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Runnable for FnWork<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    async fn execute(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

/// Lifecycle status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Registered but waiting on dependencies (or on a retry delay).
    Pending,
    /// All dependencies completed; sitting in the ready queue.
    Ready,
    /// Currently executing on a worker.
    Running,
    /// Finished successfully. Terminal.
    Completed,
    /// Exhausted its retry budget. Terminal.
    Failed,
}

impl TaskStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Caller-supplied description of a task, handed to `Scheduler::register`.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: TaskName,
    /// Higher value runs first among simultaneously eligible tasks.
    pub priority: i64,
    /// Names of tasks that must complete before this one becomes eligible.
    pub after: Vec<TaskName>,
    /// Maximum total attempts, counting the first one. `0` behaves like `1`:
    /// the first attempt always runs.
    pub max_retries: u32,
    pub work: Arc<dyn Runnable>,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>, work: Arc<dyn Runnable>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            after: Vec::new(),
            max_retries: 1,
            work,
        }
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.after = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Registry-owned record: the immutable spec plus mutable per-run state.
///
/// The registry is the single source of truth for `status`; everything else
/// reads it through the registry's accessors.
pub struct TaskRecord {
    pub name: TaskName,
    pub priority: i64,
    pub after: Vec<TaskName>,
    pub max_retries: u32,
    pub work: Arc<dyn Runnable>,

    /// Registration sequence number; realizes the deterministic tie-break
    /// between equal-priority tasks.
    pub seq: u64,
    pub created_at: Instant,

    pub status: TaskStatus,
    /// Attempts started so far (incremented together with the transition to
    /// `Running`, so the count cannot drift from the state machine).
    pub attempts: u32,
    pub last_error: Option<String>,

    /// Direct dependents, populated by `validate()` from the `after` lists.
    pub dependents: Vec<TaskName>,
}

impl TaskRecord {
    pub fn new(spec: TaskSpec, seq: u64, created_at: Instant) -> Self {
        Self {
            name: spec.name,
            priority: spec.priority,
            after: spec.after,
            max_retries: spec.max_retries.max(1),
            work: spec.work,
            seq,
            created_at,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            dependents: Vec::new(),
        }
    }
}
