// tests/state_store.rs

mod common;
use crate::common::builders::{step, PlanBuilder, StepBuilder};

use std::error::Error;

use rcubic::errors::{StepFailure, StoreError};
use rcubic::feed::FeedEventKind;
use rcubic::plan::Plan;
use rcubic::state::{RunStateStore, RunStatus, StepState, TransitionDetails};
use rcubic::types::RunId;

type TestResult = Result<(), Box<dyn Error>>;

fn two_step_plan() -> Plan {
    PlanBuilder::new()
        .with_step(step("A", &[]))
        .with_step(StepBuilder::new("B").after("A").retries(1).build())
        .build()
}

#[test]
fn new_store_starts_pending() {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    assert_eq!(store.status(), RunStatus::Pending);
    assert_eq!(store.states(), vec![StepState::Pending, StepState::Pending]);
    assert!(!store.all_terminal());
    assert!(store.feed().is_empty());
}

#[test]
fn state_machine_table() {
    use StepState::*;

    assert!(Pending.can_transition_to(Running));
    assert!(Pending.can_transition_to(Blocked));
    assert!(Pending.can_transition_to(Aborted));
    assert!(Pending.can_transition_to(Skipped));
    assert!(!Pending.can_transition_to(Succeeded));
    assert!(!Pending.can_transition_to(Failed));

    assert!(Running.can_transition_to(Succeeded));
    assert!(Running.can_transition_to(Failed));
    assert!(Running.can_transition_to(Aborted));
    assert!(!Running.can_transition_to(Pending));

    assert!(Failed.can_transition_to(Pending));
    assert!(!Failed.can_transition_to(Running));

    for terminal in [Succeeded, Blocked, Aborted, Skipped] {
        assert!(terminal.is_final());
        for to in [Pending, Running, Succeeded, Failed, Blocked, Aborted, Skipped] {
            assert!(!terminal.can_transition_to(to), "{terminal} -> {to}");
        }
    }
}

#[test]
fn invalid_transition_is_rejected_and_state_kept() {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());

    let err = store
        .transition_to("A", StepState::Succeeded, TransitionDetails::default())
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::InvalidTransition {
            step: "A".to_string(),
            from: StepState::Pending,
            to: StepState::Succeeded,
        }
    );
    assert_eq!(store.state_of("A"), Some(StepState::Pending));
    assert!(store.feed().is_empty());
}

#[test]
fn unknown_step_is_rejected() {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    let err = store
        .transition_to("nope", StepState::Running, TransitionDetails::default())
        .unwrap_err();
    assert_eq!(err, StoreError::UnknownStep("nope".to_string()));
}

#[test]
fn terminal_states_are_never_left() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());

    store.transition_to("A", StepState::Running, TransitionDetails::default())?;
    store.transition_to("A", StepState::Succeeded, TransitionDetails::default())?;

    for to in [StepState::Pending, StepState::Running, StepState::Aborted] {
        assert!(store
            .transition_to("A", to, TransitionDetails::default())
            .is_err());
    }
    assert_eq!(store.state_of("A"), Some(StepState::Succeeded));
    Ok(())
}

#[test]
fn failed_is_terminal_once_retries_are_spent() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    let failed = || {
        TransitionDetails::default()
            .with_exit_code(Some(3))
            .with_failure(StepFailure::Exit(3))
    };

    // B has one retry.
    store.transition_to("B", StepState::Running, TransitionDetails::default())?;
    store.transition_to("B", StepState::Failed, failed())?;
    assert!(!store.get("B").unwrap().is_terminal());

    store.transition_to("B", StepState::Pending, TransitionDetails::note("retrying"))?;
    store.transition_to("B", StepState::Running, TransitionDetails::default())?;
    store.transition_to("B", StepState::Failed, failed())?;

    let exec = store.get("B").unwrap();
    assert_eq!(exec.attempt, 2);
    assert_eq!(exec.retry_count, 1);
    assert_eq!(exec.exit_code, Some(3));
    assert_eq!(exec.failure, Some(StepFailure::Exit(3)));
    assert!(exec.is_terminal());
    assert!(store
        .transition_to("B", StepState::Pending, TransitionDetails::default())
        .is_err());
    Ok(())
}

#[test]
fn running_resets_previous_attempt_fields() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());

    store.transition_to("B", StepState::Running, TransitionDetails::default())?;
    store.transition_to(
        "B",
        StepState::Failed,
        TransitionDetails::default()
            .with_exit_code(Some(1))
            .with_failure(StepFailure::Exit(1)),
    )?;
    store.transition_to("B", StepState::Pending, TransitionDetails::default())?;
    store.transition_to("B", StepState::Running, TransitionDetails::default())?;

    let exec = store.get("B").unwrap();
    assert_eq!(exec.state, StepState::Running);
    assert_eq!(exec.exit_code, None);
    assert_eq!(exec.failure, None);
    assert!(exec.started_at.is_some());
    assert!(exec.finished_at.is_none());
    Ok(())
}

#[test]
fn snapshot_is_stable_without_mutation() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    store.set_run_status(RunStatus::Running);
    store.transition_to("A", StepState::Running, TransitionDetails::default())?;

    let first = store.snapshot();
    let second = store.view().snapshot();
    assert_eq!(first, second);
    assert_eq!(first.count_in(StepState::Running), 1);
    assert_eq!(first.step("B").unwrap().state, StepState::Pending);
    Ok(())
}

#[test]
fn run_status_is_sticky_once_terminal() {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    store.set_run_status(RunStatus::Running);
    store.set_run_status(RunStatus::Aborted);
    store.set_run_status(RunStatus::Succeeded);

    let snap = store.snapshot();
    assert_eq!(snap.status, RunStatus::Aborted);
    assert!(snap.started_at.is_some());
    assert!(snap.finished_at.is_some());
    assert!(store.view().is_finished());
}

#[test]
fn feed_records_transitions_in_order() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    store.set_run_status(RunStatus::Running);
    store.transition_to("A", StepState::Running, TransitionDetails::default())?;
    store.transition_to("A", StepState::Succeeded, TransitionDetails::default())?;
    store.transition_to("B", StepState::Blocked, TransitionDetails::note("upstream"))?;

    let events = store.feed().events();
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    assert_eq!(
        events[0].kind,
        FeedEventKind::RunStatusChanged {
            from: RunStatus::Pending,
            to: RunStatus::Running,
        }
    );
    assert_eq!(
        events[3].kind,
        FeedEventKind::StepTransition {
            step: "B".to_string(),
            from: StepState::Pending,
            to: StepState::Blocked,
            detail: Some("upstream".to_string()),
        }
    );
    assert!(events.iter().all(|e| e.run_id == store.run_id()));

    let tail = store.feed().events_since(2);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].seq, 3);
    assert!(store.feed().events_since(10).is_empty());
    Ok(())
}

#[tokio::test]
async fn live_subscribers_see_new_events() -> TestResult {
    let store = RunStateStore::new(RunId::new(), &two_step_plan());
    store.set_run_status(RunStatus::Running);

    let (backlog, mut rx) = store.feed().subscribe_with_backlog();
    assert_eq!(backlog.len(), 1);

    store.transition_to("A", StepState::Running, TransitionDetails::default())?;
    let event = rx.recv().await?;
    assert_eq!(event.seq, 2);
    Ok(())
}
