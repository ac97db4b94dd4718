// tests/shell_executor.rs
#![cfg(unix)]

mod common;
use crate::common::builders::{PlanBuilder, StepBuilder};
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::time::Duration;

use rcubic::engine::{Engine, EngineOptions};
use rcubic::errors::StepFailure;
use rcubic::exec::ShellExecutor;
use rcubic::state::{RunStatus, StepState};
use rcubic_test_utils::with_timeout;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn scripts_run_with_step_environment_and_logs() -> TestResult {
    init_tracing();

    let out = tempdir()?;
    let plan = PlanBuilder::new()
        .with_step(
            StepBuilder::new("hello")
                .script("echo \"step=$RCUBIC_STEP tier=$RCUBIC_TIER attempt=$RCUBIC_ATTEMPT\"")
                .build(),
        )
        .with_step(
            StepBuilder::new("fail")
                .script("echo oops >&2; exit 3")
                .after("hello")
                .critical(false)
                .build(),
        )
        .build();

    let engine = Engine::new(ShellExecutor::new(out.path()), EngineOptions::default());
    let handle = engine.submit(plan)?;
    let run_id = handle.run_id();
    let snapshot = with_timeout(handle.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Failed);

    let hello = snapshot.step("hello").unwrap();
    assert_eq!(hello.state, StepState::Succeeded);
    let log_path = out.path().join(run_id.to_string()).join("hello.1.log");
    assert_eq!(hello.output.as_ref().map(|o| o.0.clone()), Some(log_path.display().to_string()));
    assert_eq!(
        fs::read_to_string(&log_path)?.trim(),
        "step=hello tier=default attempt=1"
    );

    let fail = snapshot.step("fail").unwrap();
    assert_eq!(fail.exit_code, Some(3));
    assert_eq!(fail.failure, Some(StepFailure::Exit(3)));
    let fail_log = fs::read_to_string(out.path().join(run_id.to_string()).join("fail.1.log"))?;
    assert!(fail_log.contains("oops"));
    Ok(())
}

#[tokio::test]
async fn abort_kills_running_processes() -> TestResult {
    init_tracing();

    let out = tempdir()?;
    let plan = PlanBuilder::new()
        .abort_grace(Duration::from_secs(2))
        .with_step(StepBuilder::new("sleepy").script("sleep 30").build())
        .build();

    let engine = Engine::new(ShellExecutor::new(out.path()), EngineOptions::default());
    let handle = engine.submit(plan)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort_handle().abort().await;

    let snapshot = with_timeout(handle.wait()).await?;
    assert_eq!(snapshot.status, RunStatus::Aborted);
    assert_eq!(snapshot.step("sleepy").unwrap().state, StepState::Aborted);
    Ok(())
}

#[tokio::test]
async fn names_that_sanitize_alike_get_separate_logs() -> TestResult {
    init_tracing();

    let out = tempdir()?;
    let plan = PlanBuilder::new()
        .with_step(StepBuilder::new("a/b").script("echo slash").build())
        .with_step(StepBuilder::new("a_b").script("echo underscore").build())
        .build();

    let engine = Engine::new(ShellExecutor::new(out.path()), EngineOptions::default());
    let handle = engine.submit(plan)?;
    let run_id = handle.run_id();
    let snapshot = with_timeout(handle.wait()).await?;
    assert_eq!(snapshot.status, RunStatus::Succeeded);

    let slash = snapshot.step("a/b").unwrap().output.clone().unwrap().0;
    let underscore = snapshot.step("a_b").unwrap().output.clone().unwrap().0;
    assert_ne!(slash, underscore);

    let run_dir = out.path().join(run_id.to_string());
    assert_eq!(slash, run_dir.join("a_b@0.1.log").display().to_string());
    assert_eq!(underscore, run_dir.join("a_b.1.log").display().to_string());
    assert_eq!(fs::read_to_string(&slash)?.trim(), "slash");
    assert_eq!(fs::read_to_string(&underscore)?.trim(), "underscore");
    Ok(())
}
