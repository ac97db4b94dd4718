// src/state/execution.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::StepFailure;
use crate::types::{OutputRef, RunId, StepName};

/// State of one step within one run.
///
/// ```text
/// Pending -> Running -> Succeeded
///                    -> Failed -> Pending   (retry, bounded)
/// Pending | Running | Failed(retryable) -> Blocked | Aborted
/// Pending -> Skipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    /// Terminal once retries are exhausted.
    Failed,
    /// An upstream critical step failed.
    Blocked,
    /// The run was aborted.
    Aborted,
    /// Disabled in the plan.
    Skipped,
}

impl StepState {
    /// Whether `self -> to` is an edge of the state machine.
    ///
    /// Retry bounds on `Failed -> *` are enforced by the store, which knows
    /// the retry count.
    pub fn can_transition_to(self, to: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Blocked)
                | (Pending, Aborted)
                | (Pending, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Blocked)
                | (Running, Aborted)
                | (Failed, Pending)
                | (Failed, Blocked)
                | (Failed, Aborted)
        )
    }

    /// Terminal regardless of retry bookkeeping.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Blocked | StepState::Aborted | StepState::Skipped
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Blocked => "blocked",
            StepState::Aborted => "aborted",
            StepState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Mutable record of one step within one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepExecution {
    pub step: StepName,
    pub state: StepState,
    /// Start of the current (or last) attempt.
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code reported by the executor for the last attempt, if any.
    pub exit_code: Option<i32>,
    /// Why the last attempt failed.
    pub failure: Option<StepFailure>,
    pub output: Option<OutputRef>,
    /// Number of attempts dispatched so far.
    pub attempt: u32,
    /// Number of retries consumed.
    pub retry_count: u32,
    pub max_retries: u32,
}

impl StepExecution {
    pub fn new(step: StepName, max_retries: u32) -> Self {
        Self {
            step,
            state: StepState::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
            failure: None,
            output: None,
            attempt: 0,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn retries_left(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }

    /// No further transition is legal.
    pub fn is_terminal(&self) -> bool {
        match self.state {
            StepState::Failed => self.retries_left() == 0,
            s => s.is_final(),
        }
    }
}

/// Extra data attached to a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionDetails {
    pub exit_code: Option<i32>,
    pub failure: Option<StepFailure>,
    pub output: Option<OutputRef>,
    /// Free-form note published on the feed.
    pub note: Option<String>,
}

impl TransitionDetails {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_failure(mut self, failure: StepFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_output(mut self, output: Option<OutputRef>) -> Self {
        self.output = output;
        self
    }

    /// Text published as the feed event's `detail`.
    pub(crate) fn feed_detail(&self) -> Option<String> {
        match (&self.failure, &self.note) {
            (Some(f), Some(n)) => Some(format!("{f}; {n}")),
            (Some(f), None) => Some(f.to_string()),
            (None, Some(n)) => Some(n.clone()),
            (None, None) => None,
        }
    }
}

/// Consistent point-in-time view of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub plan: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Declaration order.
    pub steps: Vec<StepExecution>,
}

impl RunSnapshot {
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.steps.iter().find(|s| s.step == name)
    }

    pub fn count_in(&self, state: StepState) -> usize {
        self.steps.iter().filter(|s| s.state == state).count()
    }
}
