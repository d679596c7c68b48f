// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod scheduler;

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::watch;
use tracing::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::retry::RetryPolicy;
pub use engine::runtime::RunSummary;
pub use errors::Error;
pub use exec::CommandWork;
pub use graph::task::{FnWork, Runnable, TaskName, TaskSpec, TaskStatus};
pub use scheduler::{Scheduler, SchedulerOptions};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler construction + graph validation
/// - Ctrl-C handling
/// - the run itself, and the summary report
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    let mut sched = build_scheduler(&cfg, args.workers)?;
    sched.validate()?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    // Ctrl-C → graceful cancellation: in-flight tasks finish, nothing new starts.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = cancel_tx.send(true);
    });

    let summary = sched.run_with_cancel(cancel_rx).await?;
    print_summary(&summary);

    if !summary.all_completed() {
        bail!(
            "run finished with {} failed, {} blocked, {} cancelled task(s)",
            summary.failed.len(),
            summary.blocked.len(),
            summary.cancelled.len()
        );
    }
    Ok(())
}

/// Build a scheduler from a validated config, one shell-command task per
/// `[task.<name>]` entry.
///
/// Registration order is the config's name order (`BTreeMap` iteration), so
/// the equal-priority tie-break is alphabetical and reproducible.
fn build_scheduler(cfg: &ConfigFile, workers_override: Option<usize>) -> Result<Scheduler> {
    let section = &cfg.config;
    let options = SchedulerOptions {
        workers: workers_override.unwrap_or_else(|| section.effective_workers()),
        retry: section.retry_policy(),
        ..SchedulerOptions::default()
    };

    let mut sched = Scheduler::new(options);
    for (name, task) in cfg.task.iter() {
        let work = Arc::new(CommandWork::new(name.clone(), task.cmd.clone()));
        sched.register(
            TaskSpec::new(name.clone(), work)
                .priority(task.priority)
                .after(task.after.clone())
                .max_retries(task.max_retries),
        )?;
    }
    Ok(sched)
}

/// Simple dry-run output: print tasks, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskdag dry-run");
    println!("  config.workers = {}", cfg.config.effective_workers());
    println!(
        "  config.base_delay_ms = {} / max_delay_ms = {} / jitter = {}",
        cfg.config.base_delay_ms, cfg.config.max_delay_ms, cfg.config.jitter
    );
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if task.priority != 0 {
            println!("      priority: {}", task.priority);
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if task.max_retries > 1 {
            println!("      max_retries: {}", task.max_retries);
        }
    }

    info!("dry-run complete (no execution)");
}

fn print_summary(summary: &RunSummary) {
    println!("taskdag run summary");
    println!("  completed: {:?}", summary.completed);
    if !summary.failed.is_empty() {
        println!("  failed:    {:?}", summary.failed);
    }
    if !summary.blocked.is_empty() {
        println!("  blocked:   {:?}", summary.blocked);
    }
    if !summary.cancelled.is_empty() {
        println!("  cancelled: {:?}", summary.cancelled);
    }
}
