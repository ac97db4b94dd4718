// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use crate::dag::{DispatchedStep, Scheduler, SchedulerStep};
use crate::engine::StepOutcome;
use crate::types::StepName;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these steps to the executor.
    Dispatch(Vec<DispatchedStep>),
    /// Signal cooperative cancellation to these in-flight steps.
    Cancel(Vec<StepName>),
    /// Send `GraceExpired` back after this long.
    StartGraceTimer(Duration),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
    /// The scheduler's own account of what changed.
    pub scheduler: SchedulerStep,
}

impl CoreStep {
    fn from_scheduler(scheduler: &Scheduler, step: SchedulerStep) -> Self {
        let mut commands = Vec::new();
        if !step.newly_dispatched.is_empty() {
            commands.push(CoreCommand::Dispatch(step.newly_dispatched.clone()));
        }
        if !step.to_cancel.is_empty() {
            commands.push(CoreCommand::Cancel(step.to_cancel.clone()));
        }
        CoreStep {
            commands,
            keep_running: !scheduler.is_finished(),
            scheduler: step,
        }
    }
}

/// Start the run.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start();
    CoreStep::from_scheduler(scheduler, step)
}

/// Handle an executor report.
pub fn handle_step_finished(
    scheduler: &mut Scheduler,
    step: &str,
    attempt: u32,
    outcome: StepOutcome,
) -> CoreStep {
    let result = scheduler.handle_completion(step, attempt, outcome);
    CoreStep::from_scheduler(scheduler, result)
}

/// Handle an abort request.
///
/// In-flight steps get a cancellation signal and `grace` to honour it.
pub fn handle_abort(scheduler: &mut Scheduler, grace: Duration) -> CoreStep {
    let result = scheduler.handle_abort();
    let mut step = CoreStep::from_scheduler(scheduler, result);
    if step.keep_running && !step.scheduler.to_cancel.is_empty() {
        step.commands.push(CoreCommand::StartGraceTimer(grace));
    }
    step
}

/// Handle expiry of the abort grace period.
pub fn handle_grace_expired(scheduler: &mut Scheduler) -> CoreStep {
    let result = scheduler.handle_grace_expired();
    CoreStep::from_scheduler(scheduler, result)
}
