// src/dag/scheduler.rs

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::dag::budget::ConcurrencyBudget;
use crate::dag::graph::DependencyGraph;
use crate::dag::readiness::{DependencyStatus, Readiness};
use crate::dag::scheduler_step::{DispatchedStep, SchedulerStep};
use crate::engine::StepOutcome;
use crate::errors::StepFailure;
use crate::plan::Plan;
use crate::state::{RunStateStore, RunStatus, StepState, TransitionDetails};
use crate::types::{OutputRef, RunId, StepName};

/// Scheduler holds the immutable plan and graph plus the run's state store.
///
/// It is the single writer of the store and is responsible for:
/// - computing the ready set (dependencies + tier barriers satisfied)
/// - dispatching ready steps within the concurrency budget
/// - retrying failed steps while their retry budget lasts
/// - blocking dependents of critical failures
/// - aborting the run and deciding the run's final status
///
/// It is synchronous and performs no IO; the async runtime feeds it
/// completions one at a time.
#[derive(Debug)]
pub struct Scheduler {
    plan: Arc<Plan>,
    graph: Arc<DependencyGraph>,
    store: RunStateStore,
    budget: ConcurrencyBudget,
    started: bool,
    aborting: bool,
    finished: bool,
}

impl Scheduler {
    pub fn new(
        plan: Arc<Plan>,
        graph: Arc<DependencyGraph>,
        store: RunStateStore,
        max_concurrency: usize,
    ) -> Self {
        Self {
            plan,
            graph,
            store,
            budget: ConcurrencyBudget::new(max_concurrency),
            started: false,
            aborting: false,
            finished: false,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.store.run_id()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborting(&self) -> bool {
        self.aborting
    }

    pub fn max_concurrency(&self) -> usize {
        self.budget.capacity()
    }

    /// Number of steps currently holding a concurrency permit.
    pub fn running_count(&self) -> usize {
        self.budget.in_use()
    }

    /// Steps that would be dispatched if budget allowed, in dispatch order.
    pub fn ready_steps(&self) -> Vec<StepName> {
        let states = self.store.states();
        Readiness::new(&self.plan, &self.graph, &states)
            .ready()
            .into_iter()
            .map(|i| self.graph.name_of(i).to_string())
            .collect()
    }

    /// Whether the dependencies of `step` are satisfied right now.
    ///
    /// Returns `None` if the step is unknown.
    pub fn deps_satisfied(&self, step: &str) -> Option<bool> {
        let idx = self.graph.index_of(step)?;
        let states = self.store.states();
        Some(
            Readiness::new(&self.plan, &self.graph, &states).status_of(idx)
                == DependencyStatus::Satisfied,
        )
    }

    /// Start the run: skip disabled steps and dispatch the initial ready set.
    pub fn start(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.started {
            warn!(run_id = %self.run_id(), "start called twice; ignoring");
            return step;
        }
        self.started = true;

        self.store.set_run_status(RunStatus::Running);
        info!(
            run_id = %self.run_id(),
            plan = %self.plan.name(),
            steps = self.plan.len(),
            max_concurrency = self.budget.capacity(),
            "run started"
        );

        let plan = Arc::clone(&self.plan);
        for s in plan.steps().iter().filter(|s| s.skip) {
            if self.transition(
                s.index,
                StepState::Skipped,
                TransitionDetails::note("disabled in plan"),
            ) {
                info!(step = %s.name, "step skipped");
                step.newly_skipped.push(s.name.clone());
            }
        }

        step.newly_blocked = self.propagate_blocked();
        self.dispatch_ready(&mut step);
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// React to the executor's report for one attempt of `name`.
    ///
    /// Reports for an attempt that is no longer running (stale after a retry
    /// or after the abort grace period) are ignored.
    pub fn handle_completion(&mut self, name: &str, attempt: u32, outcome: StepOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(idx) = self.graph.index_of(name) else {
            warn!(step = %name, "completion for unknown step; ignoring");
            return step;
        };
        let Some(exec) = self.store.get(name) else {
            warn!(step = %name, "completion for step missing from run state; ignoring");
            return step;
        };
        if exec.state != StepState::Running || exec.attempt != attempt {
            debug!(
                step = %name,
                attempt,
                current_attempt = exec.attempt,
                state = %exec.state,
                "stale completion; ignoring"
            );
            return step;
        }

        self.budget.release();

        match outcome {
            StepOutcome::Succeeded { exit_code, output } => {
                let details = TransitionDetails::default()
                    .with_exit_code(exit_code)
                    .with_output(output);
                if self.transition(idx, StepState::Succeeded, details) {
                    info!(step = %name, attempt, "step succeeded");
                }
            }
            StepOutcome::Failed {
                failure,
                exit_code,
                output,
            } => {
                self.handle_failure(idx, exec.retries_left(), failure, exit_code, output, &mut step);
            }
        }

        self.dispatch_ready(&mut step);
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Stop dispatching, abort everything still pending and ask in-flight
    /// steps to cancel.
    pub fn handle_abort(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.finished || self.aborting {
            debug!(run_id = %self.run_id(), "abort requested again or after finish; ignoring");
            return step;
        }
        self.aborting = true;
        warn!(run_id = %self.run_id(), "abort requested; no further steps will be dispatched");

        for (idx, state) in self.store.states().into_iter().enumerate() {
            match state {
                StepState::Pending => {
                    if self.transition(idx, StepState::Aborted, TransitionDetails::note("run aborted")) {
                        step.newly_aborted.push(self.graph.name_of(idx).to_string());
                    }
                }
                StepState::Running => step.to_cancel.push(self.graph.name_of(idx).to_string()),
                _ => {}
            }
        }

        if !self.started {
            self.started = true;
        }
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Abort grace period elapsed: whatever is still running is marked
    /// `Aborted` without waiting for its executor.
    pub fn handle_grace_expired(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.finished || !self.aborting {
            return step;
        }

        for (idx, state) in self.store.states().into_iter().enumerate() {
            if state == StepState::Running
                && self.transition(
                    idx,
                    StepState::Aborted,
                    TransitionDetails::note("did not stop within the abort grace period"),
                )
            {
                self.budget.release();
                let name = self.graph.name_of(idx).to_string();
                warn!(step = %name, "step ignored cancellation; marked aborted");
                step.newly_aborted.push(name);
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    fn handle_failure(
        &mut self,
        idx: usize,
        retries_left: u32,
        failure: StepFailure,
        exit_code: Option<i32>,
        output: Option<OutputRef>,
        step: &mut SchedulerStep,
    ) {
        let name = self.graph.name_of(idx).to_string();

        if self.aborting && failure == StepFailure::Cancelled {
            let details = TransitionDetails::note("cancelled by abort").with_output(output);
            if self.transition(idx, StepState::Aborted, details) {
                info!(step = %name, "step cancelled");
                step.newly_aborted.push(name);
            }
            return;
        }

        let details = TransitionDetails::default()
            .with_exit_code(exit_code)
            .with_failure(failure.clone())
            .with_output(output);
        if !self.transition(idx, StepState::Failed, details) {
            return;
        }

        if retries_left > 0 {
            if self.aborting {
                if self.transition(idx, StepState::Aborted, TransitionDetails::note("run aborted before retry")) {
                    step.newly_aborted.push(name);
                }
                return;
            }

            warn!(step = %name, error = %failure, retries_left, "step failed; retrying");
            if self.transition(idx, StepState::Pending, TransitionDetails::note("retrying")) {
                step.retried.push(name);
            }
            return;
        }

        step.newly_failed.push(name.clone());

        if !self.plan.steps()[idx].critical {
            warn!(step = %name, error = %failure, "non-critical step failed; dependents proceed");
            return;
        }

        warn!(step = %name, error = %failure, "critical step failed; blocking dependents");
        let note = format!("upstream step '{name}' failed");
        for dep in self.graph.transitive_dependents(idx) {
            let dep_name = self.graph.name_of(dep);
            if self.store.state_of(dep_name) == Some(StepState::Pending)
                && self.transition(dep, StepState::Blocked, TransitionDetails::note(note.clone()))
            {
                debug!(step = %dep_name, upstream = %name, "marked Blocked");
                step.newly_blocked.push(dep_name.to_string());
            }
        }
    }

    /// Block pending steps whose dependencies can never be satisfied.
    ///
    /// Walks in topological order so a block cascades in a single pass.
    fn propagate_blocked(&mut self) -> Vec<StepName> {
        let mut states = self.store.states();
        let mut blocked = Vec::new();

        for &idx in self.graph.topo_idx() {
            if states[idx] != StepState::Pending {
                continue;
            }
            let status = Readiness::new(&self.plan, &self.graph, &states).status_of(idx);
            if status == DependencyStatus::Broken
                && self.transition(
                    idx,
                    StepState::Blocked,
                    TransitionDetails::note("dependency cannot be satisfied"),
                )
            {
                states[idx] = StepState::Blocked;
                blocked.push(self.graph.name_of(idx).to_string());
            }
        }

        blocked
    }

    /// Move ready steps to `Running` while the budget allows.
    fn dispatch_ready(&mut self, step: &mut SchedulerStep) {
        if self.aborting || self.finished {
            return;
        }

        let states = self.store.states();
        let ready = Readiness::new(&self.plan, &self.graph, &states).ready();
        let run_id = self.run_id();

        for idx in ready {
            if !self.budget.try_acquire() {
                debug!(
                    run_id = %run_id,
                    running = self.budget.in_use(),
                    "concurrency budget exhausted; remaining ready steps wait"
                );
                break;
            }
            if !self.transition(idx, StepState::Running, TransitionDetails::default()) {
                self.budget.release();
                continue;
            }

            let def = self.plan.steps()[idx].clone();
            let attempt = self.store.get(&def.name).map(|e| e.attempt).unwrap_or(1);
            info!(
                step = %def.name,
                tier = %def.tier,
                attempt,
                run_id = %run_id,
                "dispatching step"
            );
            step.newly_dispatched.push(DispatchedStep {
                step: def,
                run_id,
                attempt,
            });
        }
    }

    /// If every step is terminal, decide and record the run's final status.
    ///
    /// Returns `true` if this call finished the run.
    fn maybe_finish_run(&mut self) -> bool {
        if self.finished || !self.started || !self.store.all_terminal() {
            return false;
        }

        let snapshot = self.store.snapshot();
        let failed = snapshot.count_in(StepState::Failed);
        let blocked = snapshot.count_in(StepState::Blocked);
        let status = if self.aborting {
            RunStatus::Aborted
        } else if failed > 0 || blocked > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        self.store.set_run_status(status);
        self.finished = true;
        info!(
            run_id = %self.run_id(),
            %status,
            succeeded = snapshot.count_in(StepState::Succeeded),
            failed,
            blocked,
            skipped = snapshot.count_in(StepState::Skipped),
            aborted = snapshot.count_in(StepState::Aborted),
            "run finished"
        );
        true
    }

    /// Apply a transition; a rejection is an invariant violation and is
    /// logged rather than propagated.
    fn transition(&self, idx: usize, to: StepState, details: TransitionDetails) -> bool {
        let name = self.graph.name_of(idx);
        match self.store.transition_to(name, to, details) {
            Ok(()) => true,
            Err(err) => {
                error!(step = %name, error = %err, "state store rejected transition");
                false
            }
        }
    }
}
