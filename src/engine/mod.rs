// src/engine/mod.rs

//! Orchestration engine for rcubic.
//!
//! This module ties together:
//! - the DAG scheduler (pure decisions)
//! - the main runtime event loop that reacts to:
//!   - step completion events from executors
//!   - abort requests and the abort grace timer
//! - the [`Engine`] facade that validates plans, launches runs and keeps
//!   them queryable until purged.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use tokio::sync::mpsc;

use crate::errors::StepFailure;
use crate::types::{OutputRef, StepName};

/// Outcome of one step attempt, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded {
        exit_code: Option<i32>,
        output: Option<OutputRef>,
    },
    Failed {
        failure: StepFailure,
        exit_code: Option<i32>,
        output: Option<OutputRef>,
    },
}

impl StepOutcome {
    pub fn success() -> Self {
        StepOutcome::Succeeded {
            exit_code: Some(0),
            output: None,
        }
    }

    pub fn failure(failure: StepFailure) -> Self {
        let exit_code = match failure {
            StepFailure::Exit(code) => Some(code),
            _ => None,
        };
        StepOutcome::Failed {
            failure,
            exit_code,
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// Events flowing into a run's decision loop.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// An executor finished (or gave up on) one attempt of a step.
    StepFinished {
        step: StepName,
        attempt: u32,
        outcome: StepOutcome,
    },
    /// Stop dispatching and cancel in-flight steps.
    AbortRequested,
    /// The abort grace period elapsed.
    GraceExpired,
}

/// Engine-level overrides of plan settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Overrides `[plan].max_concurrency`.
    pub max_concurrency: Option<usize>,
    /// Overrides `[plan].abort_grace`.
    pub abort_grace: Option<Duration>,
}

const RUN_CHANNEL_CAPACITY: usize = 64;

/// Create the channel a run's decision loop consumes.
pub fn run_channel() -> (mpsc::Sender<RunEvent>, mpsc::Receiver<RunEvent>) {
    mpsc::channel(RUN_CHANNEL_CAPACITY)
}

pub mod core;
pub mod event_handlers;
pub mod registry;
pub mod runtime;
pub mod submit;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use registry::RunRegistry;
pub use runtime::Runtime;
pub use submit::{AbortHandle, Engine, RunHandle};
