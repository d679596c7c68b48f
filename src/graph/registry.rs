// src/graph/registry.rs

use std::collections::HashMap;
use std::time::Instant;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::graph::task::{TaskName, TaskRecord, TaskSpec, TaskStatus};

/// Single point of truth for task definitions and their current status.
///
/// The registry owns every [`TaskRecord`] and enforces the legal-transition
/// table on all status changes. Other components (resolver, queues, runtime)
/// read and mutate task state exclusively through it.
pub struct TaskRegistry {
    records: HashMap<TaskName, TaskRecord>,
    /// Task names in registration order.
    order: Vec<TaskName>,
    next_seq: u64,
    validated: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            next_seq: 0,
            validated: false,
        }
    }

    /// Register a new task.
    ///
    /// Fails on duplicate names and self-dependencies. References to tasks
    /// that are not registered yet are allowed here; they are checked by
    /// [`TaskRegistry::validate`] once the full graph is known.
    pub fn register(&mut self, spec: TaskSpec, now: Instant) -> Result<()> {
        if self.records.contains_key(&spec.name) {
            return Err(Error::DuplicateTask(spec.name));
        }
        if spec.after.iter().any(|dep| *dep == spec.name) {
            return Err(Error::SelfDependency(spec.name));
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let name = spec.name.clone();
        self.records.insert(name.clone(), TaskRecord::new(spec, seq, now));
        self.order.push(name);

        // Any prior validation no longer covers the new task.
        self.validated = false;
        Ok(())
    }

    /// Validate the full graph: every `after` reference must name a registered
    /// task and the dependency relation must be acyclic.
    ///
    /// Also (re)builds the dependents adjacency the resolver walks. Safe to
    /// call repeatedly; a passing graph passes again.
    pub fn validate(&mut self) -> Result<()> {
        for name in &self.order {
            let record = &self.records[name];
            for dep in &record.after {
                if !self.records.contains_key(dep) {
                    return Err(Error::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Edge direction: dep -> task, so a topological order exists iff the
        // dependency relation is a DAG.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &self.order {
            graph.add_node(name.as_str());
        }
        for name in &self.order {
            for dep in &self.records[name].after {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
        if let Err(cycle) = toposort(&graph, None) {
            return Err(Error::DependencyCycle(cycle.node_id().to_string()));
        }

        // Rebuild reverse adjacency in registration order so downstream walks
        // are deterministic.
        for record in self.records.values_mut() {
            record.dependents.clear();
        }
        let order = self.order.clone();
        for name in &order {
            let deps = self.records[name].after.clone();
            for dep in deps {
                self.records
                    .get_mut(&dep)
                    .expect("dependency checked above")
                    .dependents
                    .push(name.clone());
            }
        }

        debug!(tasks = self.order.len(), "task graph validated");
        self.validated = true;
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Task names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn get(&self, name: &str) -> Result<&TaskRecord> {
        self.records
            .get(name)
            .ok_or_else(|| Error::UnknownTask(name.to_string()))
    }

    pub fn status(&self, name: &str) -> Result<TaskStatus> {
        self.get(name).map(|r| r.status)
    }

    /// Apply a status transition, enforcing the legal-transition table:
    ///
    /// ```text
    /// Pending -> Ready
    /// Ready   -> Running
    /// Running -> Completed | Failed | Pending (retry)
    /// ```
    ///
    /// Terminal statuses never change again. A violation returns
    /// [`Error::IllegalTransition`] and leaves the record untouched.
    pub fn set_status(&mut self, name: &str, to: TaskStatus) -> Result<()> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTask(name.to_string()))?;

        let from = record.status;
        if !legal_transition(from, to) {
            return Err(Error::IllegalTransition {
                task: name.to_string(),
                from,
                to,
            });
        }

        record.status = to;
        Ok(())
    }

    /// Transition `Ready -> Running` and count the attempt in one mutation,
    /// so the attempt counter cannot drift from the state machine.
    pub fn begin_attempt(&mut self, name: &str) -> Result<u32> {
        self.set_status(name, TaskStatus::Running)?;
        let record = self
            .records
            .get_mut(name)
            .expect("record exists after set_status");
        record.attempts += 1;
        Ok(record.attempts)
    }

    pub fn record_error(&mut self, name: &str, error: String) -> Result<()> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTask(name.to_string()))?;
        record.last_error = Some(error);
        Ok(())
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn legal_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, Ready) | (Ready, Running) | (Running, Completed) | (Running, Failed) | (Running, Pending)
    )
}
