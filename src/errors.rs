// src/errors.rs

//! Crate-wide error types.
//!
//! The scheduler core uses the structured [`Error`] enum below. The CLI and
//! config layers keep using `anyhow` for context-rich application errors;
//! `Error` converts into `anyhow::Error` at that boundary.

use crate::graph::task::{TaskName, TaskStatus};

/// Structured errors produced by the scheduler core.
///
/// Registration and validation errors mean the caller handed us a bad graph
/// and must fix it before running. `IllegalTransition` is different: it marks
/// an internal invariant breach and is never expected during normal operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("duplicate task '{0}'")]
    DuplicateTask(TaskName),

    #[error("task '{0}' cannot depend on itself in `after`")]
    SelfDependency(TaskName),

    #[error("task '{task}' has unknown dependency '{dependency}' in `after`")]
    UnknownDependency {
        task: TaskName,
        dependency: TaskName,
    },

    #[error("cycle detected in task graph involving task '{0}'")]
    DependencyCycle(TaskName),

    #[error("illegal status transition for task '{task}': {from:?} -> {to:?}")]
    IllegalTransition {
        task: TaskName,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("unknown task '{0}'")]
    UnknownTask(TaskName),

    #[error("run requires a successful validate() first")]
    NotValidated,

    #[error("task graph is empty; nothing to run")]
    EmptyGraph,
}

/// Result alias for the scheduler core.
pub type Result<T> = std::result::Result<T, Error>;
