// src/graph/resolver.rs

//! Eligibility decisions over the task graph.
//!
//! The resolver decides which `Pending` tasks have every dependency
//! `Completed` and promotes them to `Ready`. It never touches the ready
//! queue itself; the runtime pushes whatever is returned here.

use tracing::debug;

use crate::graph::registry::TaskRegistry;
use crate::graph::task::{TaskName, TaskStatus};

/// Tasks with an empty dependency set, promoted to `Ready`.
///
/// Called once at run start to seed the ready queue. Returns names in
/// registration order.
pub fn initial_ready(registry: &mut TaskRegistry) -> Vec<TaskName> {
    let roots: Vec<TaskName> = registry
        .names()
        .filter(|name| {
            registry.get(name).map_or(false, |r| {
                r.status == TaskStatus::Pending && r.after.is_empty()
            })
        })
        .map(|s| s.to_string())
        .collect();

    for name in &roots {
        promote(registry, name);
    }
    roots
}

/// Tasks unblocked by the completion of `completed`, promoted to `Ready`.
///
/// Called exactly once per task completion. Walks the dependents adjacency
/// rather than scanning every pending task, so each promotion is O(deps).
pub fn newly_ready(registry: &mut TaskRegistry, completed: &str) -> Vec<TaskName> {
    let candidates: Vec<TaskName> = registry
        .get(completed)
        .map(|r| r.dependents.clone())
        .unwrap_or_default();

    let mut ready = Vec::new();
    for name in candidates {
        let eligible = registry.get(&name).map_or(false, |r| {
            r.status == TaskStatus::Pending && deps_satisfied(registry, &r.after)
        });
        if eligible {
            promote(registry, &name);
            ready.push(name);
        }
    }
    ready
}

/// The transitive downstream subgraph of a permanently failed task.
///
/// Every returned task still has status `Pending` (none of them can have
/// become `Ready` while a dependency was unfinished); the runtime records
/// them as blocked in the summary. Blocking propagates through the whole
/// subgraph: a task behind a blocked task is itself blocked.
pub fn blocked_subgraph(registry: &TaskRegistry, failed: &str) -> Vec<TaskName> {
    let mut stack: Vec<TaskName> = registry
        .get(failed)
        .map(|r| r.dependents.clone())
        .unwrap_or_default();

    let mut blocked = Vec::new();
    while let Some(name) = stack.pop() {
        if blocked.contains(&name) {
            continue;
        }
        if let Ok(record) = registry.get(&name) {
            debug!(task = %name, upstream = %failed, "marking task as blocked by failed dependency");
            blocked.push(name);
            stack.extend(record.dependents.iter().cloned());
        }
    }
    blocked
}

fn deps_satisfied(registry: &TaskRegistry, deps: &[TaskName]) -> bool {
    deps.iter()
        .all(|dep| matches!(registry.status(dep), Ok(TaskStatus::Completed)))
}

fn promote(registry: &mut TaskRegistry, name: &str) {
    debug!(task = %name, "dependencies satisfied; promoting to ready");
    registry
        .set_status(name, TaskStatus::Ready)
        .expect("pending -> ready is always legal for a pending task");
}
