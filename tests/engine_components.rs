use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskdag::clock::{Clock, ManualClock};
use taskdag::engine::{DelayQueue, ReadyEntry, ReadyQueue, RetryDecision, RetryPolicy};
use taskdag::errors::Error as SchedError;
use taskdag::graph::{resolver, FnWork, Runnable, TaskRegistry, TaskSpec, TaskStatus};

type TestResult = Result<(), Box<dyn Error>>;

fn noop() -> Arc<dyn Runnable> {
    Arc::new(FnWork::new(|| Ok(())))
}

fn entry(name: &str, priority: i64, seq: u64) -> ReadyEntry {
    ReadyEntry {
        name: name.to_string(),
        priority,
        seq,
    }
}

#[test]
fn ready_queue_pops_by_priority_then_registration_order() {
    let mut queue = ReadyQueue::new();
    queue.push(entry("late-low", 1, 3));
    queue.push(entry("early-low", 1, 0));
    queue.push(entry("high", 9, 2));
    queue.push(entry("mid", 5, 1));

    let popped: Vec<String> = std::iter::from_fn(|| queue.pop().map(|e| e.name)).collect();
    assert_eq!(popped, ["high", "mid", "early-low", "late-low"]);
    assert!(queue.is_empty());
}

#[test]
fn ready_queue_pop_on_empty_returns_none() {
    let mut queue = ReadyQueue::new();
    assert!(queue.pop().is_none());
}

#[test]
fn delay_queue_releases_entries_only_once_due() {
    let clock = ManualClock::new(Instant::now());
    let mut delayed = DelayQueue::new();

    delayed.schedule("soon".to_string(), 0, clock.now() + Duration::from_millis(100));
    delayed.schedule("later".to_string(), 1, clock.now() + Duration::from_millis(300));

    assert!(delayed.pop_due(clock.now()).is_empty());

    clock.advance(Duration::from_millis(150));
    assert_eq!(delayed.pop_due(clock.now()), ["soon"]);
    assert_eq!(delayed.len(), 1);

    clock.advance(Duration::from_millis(200));
    assert_eq!(delayed.pop_due(clock.now()), ["later"]);
    assert!(delayed.is_empty());
}

#[test]
fn delay_queue_next_due_is_the_earliest_deadline() {
    let start = Instant::now();
    let mut delayed = DelayQueue::new();
    delayed.schedule("b".to_string(), 1, start + Duration::from_secs(2));
    delayed.schedule("a".to_string(), 0, start + Duration::from_secs(1));

    assert_eq!(delayed.next_due(), Some(start + Duration::from_secs(1)));
}

#[test]
fn retry_delay_doubles_then_hits_the_cap() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(2),
        jitter: false,
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(500));
    assert_eq!(policy.delay_for(2), Duration::from_secs(1));
    assert_eq!(policy.delay_for(3), Duration::from_secs(2));
    // Capped from here on.
    assert_eq!(policy.delay_for(4), Duration::from_secs(2));
    assert_eq!(policy.delay_for(60), Duration::from_secs(2));
}

#[test]
fn retry_jitter_stays_within_half_to_one_and_a_half() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(1000),
        max_delay: Duration::from_secs(60),
        jitter: true,
    };

    for _ in 0..200 {
        let delay = policy.delay_for(1);
        assert!(delay >= Duration::from_millis(500), "jittered delay too small: {delay:?}");
        assert!(delay < Duration::from_millis(1500), "jittered delay too large: {delay:?}");
    }
}

#[test]
fn retry_gives_up_once_attempts_reach_the_budget() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        jitter: false,
    };

    assert!(matches!(policy.decide(1, 3), RetryDecision::Retry(_)));
    assert!(matches!(policy.decide(2, 3), RetryDecision::Retry(_)));
    assert_eq!(policy.decide(3, 3), RetryDecision::GiveUp);
    assert_eq!(policy.decide(1, 1), RetryDecision::GiveUp);
}

#[test]
fn registry_enforces_the_legal_transition_table() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register(TaskSpec::new("t", noop()), Instant::now())?;

    // Pending may not jump straight to Running.
    let err = registry.set_status("t", TaskStatus::Running).unwrap_err();
    assert!(matches!(err, SchedError::IllegalTransition { .. }));

    registry.set_status("t", TaskStatus::Ready)?;
    assert_eq!(registry.begin_attempt("t")?, 1);
    registry.set_status("t", TaskStatus::Completed)?;

    // Terminal statuses never change again.
    let err = registry.set_status("t", TaskStatus::Pending).unwrap_err();
    assert!(matches!(err, SchedError::IllegalTransition { .. }));
    Ok(())
}

#[test]
fn registry_counts_attempts_with_each_running_transition() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register(TaskSpec::new("t", noop()), Instant::now())?;

    registry.set_status("t", TaskStatus::Ready)?;
    assert_eq!(registry.begin_attempt("t")?, 1);
    registry.set_status("t", TaskStatus::Pending)?; // retry
    registry.set_status("t", TaskStatus::Ready)?;
    assert_eq!(registry.begin_attempt("t")?, 2);
    Ok(())
}

#[test]
fn resolver_seeds_roots_and_promotes_dependents_as_dependencies_complete() -> TestResult {
    let mut registry = TaskRegistry::new();
    let now = Instant::now();
    registry.register(TaskSpec::new("a", noop()), now)?;
    registry.register(TaskSpec::new("b", noop()).after(["a"]), now)?;
    registry.register(TaskSpec::new("c", noop()).after(["a", "b"]), now)?;
    registry.validate()?;

    assert_eq!(resolver::initial_ready(&mut registry), ["a"]);
    assert_eq!(registry.status("a")?, TaskStatus::Ready);

    // Completing "a" unblocks "b" but not "c" (still waiting on "b").
    registry.begin_attempt("a")?;
    registry.set_status("a", TaskStatus::Completed)?;
    assert_eq!(resolver::newly_ready(&mut registry, "a"), ["b"]);
    assert_eq!(registry.status("c")?, TaskStatus::Pending);

    registry.begin_attempt("b")?;
    registry.set_status("b", TaskStatus::Completed)?;
    assert_eq!(resolver::newly_ready(&mut registry, "b"), ["c"]);
    Ok(())
}

#[test]
fn resolver_collects_the_transitive_blocked_subgraph() -> TestResult {
    let mut registry = TaskRegistry::new();
    let now = Instant::now();
    registry.register(TaskSpec::new("f", noop()), now)?;
    registry.register(TaskSpec::new("d1", noop()).after(["f"]), now)?;
    registry.register(TaskSpec::new("d2", noop()).after(["d1"]), now)?;
    registry.register(TaskSpec::new("other", noop()), now)?;
    registry.validate()?;

    let mut blocked = resolver::blocked_subgraph(&registry, "f");
    blocked.sort();
    assert_eq!(blocked, ["d1", "d2"]);
    Ok(())
}
