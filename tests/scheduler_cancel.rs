use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::watch;

use taskdag::{FnWork, RetryPolicy, Runnable, Scheduler, SchedulerOptions, TaskSpec};

type TestResult = Result<(), Box<dyn Error>>;

/// Work that takes a while, so a cancel signal can land mid-flight.
struct SlowWork(Duration);

#[async_trait]
impl Runnable for SlowWork {
    async fn execute(&self) -> anyhow::Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

fn single_worker() -> SchedulerOptions {
    SchedulerOptions {
        workers: 1,
        ..SchedulerOptions::default()
    }
}

#[tokio::test]
async fn cancel_finishes_in_flight_work_but_dequeues_nothing_new() -> TestResult {
    let mut sched = Scheduler::new(single_worker());
    sched.register(TaskSpec::new("slow", Arc::new(SlowWork(Duration::from_millis(100)))))?;
    sched.register(TaskSpec::new("next", Arc::new(FnWork::new(|| Ok(())))).after(["slow"]))?;
    sched.validate()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run = tokio::spawn(sched.run_with_cancel(cancel_rx));

    // Let "slow" get dispatched, then cancel while it is still running.
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel_tx.send(true)?;

    let summary = run.await??;

    // The in-flight task finished and is recorded; its dependent never ran.
    assert_eq!(summary.completed, ["slow"]);
    assert_eq!(summary.cancelled, ["next"]);
    assert!(summary.failed.is_empty());
    assert!(summary.blocked.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_abandons_retries_waiting_on_backoff() -> TestResult {
    let attempts = Arc::new(AtomicU32::new(0));
    let work = {
        let attempts = Arc::clone(&attempts);
        Arc::new(FnWork::new(move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("flaky"))
        }))
    };

    let mut sched = Scheduler::new(SchedulerOptions {
        workers: 1,
        retry: RetryPolicy {
            // Long enough that the cancel lands during the backoff wait.
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            jitter: false,
        },
        ..SchedulerOptions::default()
    });
    sched.register(TaskSpec::new("flaky", work).max_retries(3))?;
    sched.validate()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run = tokio::spawn(sched.run_with_cancel(cancel_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_tx.send(true)?;

    let summary = run.await??;

    // One attempt happened; the scheduled retry was abandoned, so the task
    // is neither completed nor failed.
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(summary.completed.is_empty());
    assert!(summary.failed.is_empty());
    assert_eq!(summary.cancelled, ["flaky"]);
    Ok(())
}

#[tokio::test]
async fn blocked_outcome_survives_a_later_cancellation() -> TestResult {
    let mut sched = Scheduler::new(single_worker());
    sched.register(
        TaskSpec::new("bad", Arc::new(FnWork::new(|| Err(anyhow!("boom")))))
            .priority(10)
            .max_retries(1),
    )?;
    sched.register(TaskSpec::new("behind-bad", Arc::new(FnWork::new(|| Ok(())))).after(["bad"]))?;
    sched.register(TaskSpec::new("slow", Arc::new(SlowWork(Duration::from_millis(100)))))?;
    sched.validate()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run = tokio::spawn(sched.run_with_cancel(cancel_rx));

    // "bad" runs and fails first (highest priority), blocking "behind-bad";
    // the cancel then lands while "slow" is in flight.
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel_tx.send(true)?;

    let summary = run.await??;

    assert_eq!(summary.failed, ["bad"]);
    assert_eq!(summary.blocked, ["behind-bad"]);
    assert_eq!(summary.completed, ["slow"]);
    assert!(summary.cancelled.is_empty());
    Ok(())
}
