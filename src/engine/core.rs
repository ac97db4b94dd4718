// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RunEvent`]s and produces:
//! - an updated scheduler / run state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the run channel
//! - spawning executor calls for dispatched steps
//! - delivering cancellation signals and running the grace timer
//!
//! The core can be unit tested without any Tokio, channels or processes.

use std::sync::Arc;
use std::time::Duration;

use crate::dag::{DependencyGraph, Scheduler};
use crate::engine::event_handlers::{
    handle_abort, handle_grace_expired, handle_start, handle_step_finished, CoreStep,
};
use crate::engine::{EngineOptions, RunEvent};
use crate::plan::Plan;
use crate::state::{RunStateStore, RunView};
use crate::types::RunId;

/// Pure core runtime state.
///
/// Owns the scheduler (and through it the run's state store) plus the
/// resolved abort grace period. No channels, no Tokio types, no IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    abort_grace: Duration,
}

impl CoreRuntime {
    /// Build the core for a new run of `plan`.
    ///
    /// `graph` must come from [`crate::dag::build_graph`] on the same plan.
    pub fn new(
        plan: Arc<Plan>,
        graph: Arc<DependencyGraph>,
        run_id: RunId,
        options: &EngineOptions,
    ) -> Self {
        let store = RunStateStore::new(run_id, &plan);
        let max_concurrency = options
            .max_concurrency
            .unwrap_or(plan.settings().max_concurrency);
        let abort_grace = options.abort_grace.unwrap_or(plan.settings().abort_grace);
        let scheduler = Scheduler::new(plan, graph, store, max_concurrency);
        Self {
            scheduler,
            abort_grace,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.scheduler.run_id()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Read-only view of this run's state.
    pub fn view(&self) -> RunView {
        self.scheduler.store().view()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Begin the run and return the initial dispatches.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single run event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RunEvent) -> CoreStep {
        match event {
            RunEvent::StepFinished {
                step,
                attempt,
                outcome,
            } => handle_step_finished(&mut self.scheduler, &step, attempt, outcome),
            RunEvent::AbortRequested => handle_abort(&mut self.scheduler, self.abort_grace),
            RunEvent::GraceExpired => handle_grace_expired(&mut self.scheduler),
        }
    }
}
