use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use taskdag::config::{load_and_validate, load_from_path};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<(tempfile::TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Taskdag.toml");
    fs::write(&path, contents)?;
    Ok((dir, path))
}

#[test]
fn minimal_config_parses_with_defaults() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[task.hello]
cmd = "echo hello"
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.task.len(), 1);
    let task = &cfg.task["hello"];
    assert_eq!(task.cmd, "echo hello");
    assert_eq!(task.priority, 0);
    assert!(task.after.is_empty());
    assert_eq!(task.max_retries, 1);

    assert!(cfg.config.workers.is_none());
    assert!(cfg.config.effective_workers() >= 1);
    let retry = cfg.config.retry_policy();
    assert_eq!(retry.base_delay, Duration::from_millis(500));
    assert_eq!(retry.max_delay, Duration::from_millis(30_000));
    assert!(retry.jitter);
    Ok(())
}

#[test]
fn full_config_roundtrips_fields() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[config]
workers = 2
base_delay_ms = 100
max_delay_ms = 1000
jitter = false

[task.fetch]
cmd = "./fetch.sh"
priority = 10

[task.build]
cmd = "make build"
after = ["fetch"]
max_retries = 3
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.config.workers, Some(2));
    assert_eq!(cfg.config.effective_workers(), 2);
    let retry = cfg.config.retry_policy();
    assert_eq!(retry.base_delay, Duration::from_millis(100));
    assert!(!retry.jitter);

    assert_eq!(cfg.task["fetch"].priority, 10);
    assert_eq!(cfg.task["build"].after, ["fetch"]);
    assert_eq!(cfg.task["build"].max_retries, 3);
    Ok(())
}

#[test]
fn config_without_tasks_is_rejected() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[config]
workers = 2
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("at least one [task"));
    Ok(())
}

#[test]
fn unknown_dependency_is_rejected() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[task.build]
cmd = "make"
after = ["fetch"]
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("unknown dependency"));
    Ok(())
}

#[test]
fn self_dependency_is_rejected() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[task.build]
cmd = "make"
after = ["build"]
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("cannot depend on itself"));
    Ok(())
}

#[test]
fn zero_workers_is_rejected() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[config]
workers = 0

[task.a]
cmd = "true"
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("workers must be >= 1"));
    Ok(())
}

#[test]
fn inverted_delay_bounds_are_rejected() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[config]
base_delay_ms = 1000
max_delay_ms = 100

[task.a]
cmd = "true"
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("max_delay_ms"));
    Ok(())
}

#[test]
fn loading_a_missing_file_mentions_the_path() {
    let err = load_from_path("does/not/exist/Taskdag.toml").unwrap_err();
    assert!(err.to_string().contains("does/not/exist"));
}
