// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::retry::RetryPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// workers = 4
/// base_delay_ms = 500
/// max_delay_ms = 30000
///
/// [task.fetch]
/// cmd = "./fetch.sh"
/// priority = 10
///
/// [task.build]
/// cmd = "make build"
/// after = ["fetch"]
/// max_retries = 3
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`.
    ///
    /// Keys are the task names (e.g. `"fetch"`, `"build"`).
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section: worker pool size and retry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Number of concurrent workers. If unset, one per available core.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Base delay for the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the exponential backoff, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomize retry delays so simultaneous retries spread out.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl ConfigSection {
    /// Convenience: effective worker count, with the per-core default applied.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Retry policy built from the `[config]` delays.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute.
    pub cmd: String,

    /// Higher priority runs first among simultaneously eligible tasks.
    #[serde(default)]
    pub priority: i64,

    /// Dependency list: this task waits for all tasks listed here.
    ///
    /// This is the TOML `after = ["fetch", "lint"]` field.
    #[serde(default)]
    pub after: Vec<String>,

    /// Maximum total attempts for this task, the first one included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    1
}
