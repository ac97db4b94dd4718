// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::{step, PlanBuilder, StepBuilder};
use crate::common::init_tracing;

use std::error::Error;
use std::time::Duration;

use rcubic::engine::{Engine, EngineOptions};
use rcubic::errors::StepFailure;
use rcubic::state::{RunStatus, StepState};
use rcubic_test_utils::fake_executor::{Scripted, ScriptedExecutor};
use rcubic_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn chain_runs_in_dependency_order() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(step("C", &["B"]))
        .with_step(step("B", &["A"]))
        .with_step(step("A", &[]))
        .build();
    let executor = ScriptedExecutor::new();
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let handle = engine.submit(plan)?;
    let snapshot = with_timeout(handle.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(executor.started(), vec!["A", "B", "C"]);
    let a = snapshot.step("A").unwrap();
    assert_eq!(a.exit_code, Some(0));
    assert_eq!(a.output.as_ref().map(|o| o.0.as_str()), Some("fake://A/1"));
    Ok(())
}

#[tokio::test]
async fn concurrency_limit_is_never_exceeded() -> TestResult {
    init_tracing();

    let mut builder = PlanBuilder::new().max_concurrency(2);
    for i in 0..6 {
        builder = builder.with_step(step(&format!("s{i}"), &[]));
    }
    let executor = ScriptedExecutor::new().with_default_delay(Duration::from_millis(20));
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let snapshot = with_timeout(engine.submit(builder.build())?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(snapshot.count_in(StepState::Succeeded), 6);
    assert!(executor.max_concurrent() <= 2, "peak was {}", executor.max_concurrent());
    Ok(())
}

#[tokio::test]
async fn engine_option_overrides_plan_concurrency() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .max_concurrency(4)
        .with_step(step("a", &[]))
        .with_step(step("b", &[]))
        .with_step(step("c", &[]))
        .build();
    let executor = ScriptedExecutor::new().with_default_delay(Duration::from_millis(20));
    let options = EngineOptions {
        max_concurrency: Some(1),
        ..EngineOptions::default()
    };
    let engine = Engine::new(executor.clone(), options);

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;
    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(executor.max_concurrent(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_step_is_retried_then_succeeds() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(StepBuilder::new("flaky").retries(2).build())
        .with_step(step("next", &["flaky"]))
        .build();
    let executor = ScriptedExecutor::new().script(
        "flaky",
        vec![Scripted::Exit(1), Scripted::Exit(1), Scripted::Succeed],
    );
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(executor.attempts_of("flaky"), 3);
    assert_eq!(snapshot.step("flaky").unwrap().attempt, 3);
    assert_eq!(executor.started().last().map(String::as_str), Some("next"));
    Ok(())
}

#[tokio::test]
async fn critical_failure_blocks_downstream_and_fails_run() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(step("build", &[]))
        .with_step(step("deploy", &["build"]))
        .with_step(step("notify", &["deploy"]))
        .build();
    let executor = ScriptedExecutor::new().script("build", vec![Scripted::Exit(7)]);
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Failed);
    let build = snapshot.step("build").unwrap();
    assert_eq!(build.state, StepState::Failed);
    assert_eq!(build.failure, Some(StepFailure::Exit(7)));
    assert_eq!(snapshot.step("deploy").unwrap().state, StepState::Blocked);
    assert_eq!(snapshot.step("notify").unwrap().state, StepState::Blocked);
    assert_eq!(executor.started(), vec!["build"]);
    Ok(())
}

#[tokio::test]
async fn executor_error_is_a_step_failure() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new().with_step(step("remote", &[])).build();
    let executor =
        ScriptedExecutor::new().script("remote", vec![Scripted::Error("host unreachable".into())]);
    let engine = Engine::new(executor, EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Failed);
    match &snapshot.step("remote").unwrap().failure {
        Some(StepFailure::Executor(msg)) => assert!(msg.contains("host unreachable")),
        other => panic!("expected executor failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn panicking_executor_fails_the_step_and_the_run_finishes() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(step("A", &[]))
        .with_step(step("B", &["A"]))
        .build();
    let executor = ScriptedExecutor::new().script("A", vec![Scripted::Panic]);
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Failed);
    let a = snapshot.step("A").unwrap();
    assert_eq!(a.state, StepState::Failed);
    assert_eq!(
        a.failure,
        Some(StepFailure::Executor("executor panicked".to_string()))
    );
    assert_eq!(snapshot.step("B").unwrap().state, StepState::Blocked);
    assert_eq!(executor.started(), vec!["A"]);
    Ok(())
}

#[tokio::test]
async fn panicked_attempt_is_retried() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(StepBuilder::new("A").retries(1).build())
        .build();
    let executor = ScriptedExecutor::new().script("A", vec![Scripted::Panic, Scripted::Succeed]);
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(executor.attempts_of("A"), 2);
    Ok(())
}

#[tokio::test]
async fn slow_step_times_out() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(
            StepBuilder::new("slow")
                .timeout(Duration::from_millis(50))
                .build(),
        )
        .build();
    let executor = ScriptedExecutor::new().delay("slow", Duration::from_secs(30));
    let engine = Engine::new(executor, EngineOptions::default());

    let snapshot = with_timeout(engine.submit(plan)?.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Failed);
    assert_eq!(
        snapshot.step("slow").unwrap().failure,
        Some(StepFailure::ExecutionTimeout(Duration::from_millis(50)))
    );
    Ok(())
}

#[tokio::test]
async fn abort_cancels_in_flight_steps() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(step("long", &[]))
        .with_step(step("after", &["long"]))
        .build();
    let executor = ScriptedExecutor::new().script("long", vec![Scripted::HangUntilCancelled]);
    let engine = Engine::new(executor.clone(), EngineOptions::default());

    let handle = engine.submit(plan)?;
    handle.abort_handle().abort().await;
    let snapshot = with_timeout(handle.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Aborted);
    assert_eq!(snapshot.step("long").unwrap().state, StepState::Aborted);
    assert_eq!(snapshot.step("after").unwrap().state, StepState::Aborted);
    assert_eq!(executor.started(), vec!["long"]);
    Ok(())
}

#[tokio::test]
async fn abort_grace_expires_for_stubborn_steps() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .abort_grace(Duration::from_millis(50))
        .with_step(step("stubborn", &[]))
        .build();
    let executor = ScriptedExecutor::new().script("stubborn", vec![Scripted::IgnoreCancel]);
    let engine = Engine::new(executor, EngineOptions::default());

    let handle = engine.submit(plan)?;
    handle.abort_handle().abort().await;
    let snapshot = with_timeout(handle.wait()).await?;

    assert_eq!(snapshot.status, RunStatus::Aborted);
    assert_eq!(snapshot.step("stubborn").unwrap().state, StepState::Aborted);
    Ok(())
}

#[tokio::test]
async fn malformed_graph_is_rejected_before_a_run_exists() {
    init_tracing();

    let plan = PlanBuilder::new()
        .with_step(step("A", &["B"]))
        .with_step(step("B", &["A"]))
        .build();
    let engine = Engine::new(ScriptedExecutor::new(), EngineOptions::default());

    assert!(engine.submit(plan).is_err());
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn finished_runs_stay_queryable_until_purged() -> TestResult {
    init_tracing();

    let engine = Engine::new(ScriptedExecutor::new(), EngineOptions::default());
    let handle = engine.submit(PlanBuilder::new().with_step(step("A", &[])).build())?;
    let run_id = handle.run_id();
    with_timeout(handle.wait()).await?;

    let view = engine.view(run_id).expect("run should be registered");
    assert_eq!(view.status(), RunStatus::Succeeded);
    assert_eq!(engine.runs(), vec![run_id]);

    assert!(engine.purge(run_id));
    assert!(engine.view(run_id).is_none());
    assert!(!engine.purge(run_id));
    Ok(())
}

#[tokio::test]
async fn running_runs_cannot_be_purged() -> TestResult {
    init_tracing();

    let executor = ScriptedExecutor::new().script("long", vec![Scripted::HangUntilCancelled]);
    let engine = Engine::new(executor, EngineOptions::default());
    let handle = engine.submit(PlanBuilder::new().with_step(step("long", &[])).build())?;

    assert!(!engine.purge(handle.run_id()));

    handle.abort_handle().abort().await;
    with_timeout(handle.wait()).await?;
    assert!(engine.purge(engine.runs()[0]));
    Ok(())
}
