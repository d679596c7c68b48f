// src/engine/delay_queue.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::graph::task::TaskName;

/// A retry waiting out its backoff delay.
///
/// Reverse ordering on the due time so the `BinaryHeap` acts as a min-heap
/// (earliest due first); ties fall back to registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DelayedEntry {
    due: Instant,
    seq: u64,
    name: TaskName,
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Holding area for retries that are scheduled but not yet due.
///
/// Tasks in here do not occupy a worker slot; the runtime moves them back
/// into the ready queue once their delay elapses.
#[derive(Debug, Default)]
pub struct DelayQueue {
    heap: BinaryHeap<DelayedEntry>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn schedule(&mut self, name: TaskName, seq: u64, due: Instant) {
        self.heap.push(DelayedEntry { due, seq, name });
    }

    /// The earliest due time, if any retry is waiting.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.due)
    }

    /// Pop every entry whose due time has passed, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TaskName> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            let entry = self.heap.pop().expect("peeked entry exists");
            due.push(entry.name);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Abandon all pending retries, returning the affected task names.
    /// Used when a run is cancelled.
    pub fn drain(&mut self) -> Vec<TaskName> {
        self.heap.drain().map(|e| e.name).collect()
    }
}
