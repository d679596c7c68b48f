// src/engine/mod.rs

//! Execution engine for taskdag.
//!
//! This module ties together:
//! - the ready queue (priority order among eligible tasks)
//! - the delay queue (retries waiting out their backoff)
//! - the retry policy (bounded exponential backoff with jitter)
//! - the runtime event loop driving a bounded worker pool

pub mod delay_queue;
pub mod ready_queue;
pub mod retry;
pub mod runtime;

pub use delay_queue::DelayQueue;
pub use ready_queue::{ReadyEntry, ReadyQueue};
pub use retry::{RetryDecision, RetryPolicy};
pub use runtime::RunSummary;
