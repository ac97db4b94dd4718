// src/dag/scheduler_step.rs

//! Step-by-step result types for the scheduler.

use crate::plan::Step;
use crate::types::{RunId, StepName};

/// Description of a step the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct DispatchedStep {
    pub step: Step,
    pub run_id: RunId,
    /// 1-based attempt number; completions must quote it back.
    pub attempt: u32,
}

impl DispatchedStep {
    pub fn name(&self) -> &str {
        &self.step.name
    }
}

/// Structured result of a single scheduler decision.
///
/// Tests use this to step the engine by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Steps moved `Pending -> Running` by this decision.
    pub newly_dispatched: Vec<DispatchedStep>,
    /// Steps that reached terminal `Failed`.
    pub newly_failed: Vec<StepName>,
    /// Steps moved to `Blocked` by an upstream failure.
    pub newly_blocked: Vec<StepName>,
    /// Steps moved `Pending -> Skipped` at run start.
    pub newly_skipped: Vec<StepName>,
    /// Steps moved to `Aborted`.
    pub newly_aborted: Vec<StepName>,
    /// Steps sent back to `Pending` for another attempt.
    pub retried: Vec<StepName>,
    /// In-flight steps whose executors should be asked to cancel.
    pub to_cancel: Vec<StepName>,
    /// Whether this decision made the run terminal.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn dispatched_names(&self) -> Vec<&str> {
        self.newly_dispatched.iter().map(|d| d.name()).collect()
    }
}
