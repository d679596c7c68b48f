// src/config/validate.rs

use anyhow::{anyhow, Result};

use crate::config::model::ConfigFile;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one task
/// - `workers`, if set, is at least 1
/// - `max_delay_ms >= base_delay_ms`
/// - all `after` dependencies refer to existing tasks, and no task depends
///   on itself
///
/// It does **not** check the graph for cycles; that is the scheduler's job
/// (`Scheduler::validate`), which runs before anything executes.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &ConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [task.<name>] section"
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.workers == Some(0) {
        return Err(anyhow!("[config].workers must be >= 1 (got 0)"));
    }

    if cfg.config.max_delay_ms < cfg.config.base_delay_ms {
        return Err(anyhow!(
            "[config].max_delay_ms ({}) must not be smaller than base_delay_ms ({})",
            cfg.config.max_delay_ms,
            cfg.config.base_delay_ms
        ));
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(anyhow!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name,
                    dep
                ));
            }
            if dep == name {
                return Err(anyhow!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                ));
            }
        }
    }
    Ok(())
}
