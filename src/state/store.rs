// src/state/store.rs

//! Concurrency-safe run state.
//!
//! One `RwLock` guards the whole run record. A transition takes the write
//! lock, checks the state machine, mutates the record and appends to the feed
//! before releasing it, so readers only ever see fully-applied transitions
//! and the feed order matches the order in which transitions happened.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, trace};

use crate::errors::StoreError;
use crate::feed::{EventFeed, FeedEventKind};
use crate::plan::Plan;
use crate::state::execution::{
    RunSnapshot, RunStatus, StepExecution, StepState, TransitionDetails,
};
use crate::types::{RunId, StepName};

#[derive(Debug)]
struct RunRecord {
    run_id: RunId,
    plan: String,
    status: RunStatus,
    started_at: Option<chrono::DateTime<Utc>>,
    finished_at: Option<chrono::DateTime<Utc>>,
    steps: Vec<StepExecution>,
    by_name: HashMap<StepName, usize>,
}

impl RunRecord {
    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            plan: self.plan.clone(),
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            steps: self.steps.clone(),
        }
    }
}

/// Mutation handle for one run's state. Held by the scheduler.
#[derive(Debug, Clone)]
pub struct RunStateStore {
    inner: Arc<RwLock<RunRecord>>,
    feed: EventFeed,
}

impl RunStateStore {
    /// Create the record for a new run: every step `Pending`, run `Pending`.
    pub fn new(run_id: RunId, plan: &Plan) -> Self {
        let steps: Vec<StepExecution> = plan
            .steps()
            .iter()
            .map(|s| StepExecution::new(s.name.clone(), s.retries))
            .collect();
        let by_name = steps
            .iter()
            .enumerate()
            .map(|(i, e)| (e.step.clone(), i))
            .collect();

        Self {
            inner: Arc::new(RwLock::new(RunRecord {
                run_id,
                plan: plan.name().to_string(),
                status: RunStatus::Pending,
                started_at: None,
                finished_at: None,
                steps,
                by_name,
            })),
            feed: EventFeed::new(run_id),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.feed.run_id()
    }

    pub fn get(&self, step: &str) -> Option<StepExecution> {
        let rec = self.read();
        rec.by_name.get(step).map(|&i| rec.steps[i].clone())
    }

    pub fn state_of(&self, step: &str) -> Option<StepState> {
        let rec = self.read();
        rec.by_name.get(step).map(|&i| rec.steps[i].state)
    }

    /// States of all steps in declaration order, read under one lock.
    pub fn states(&self) -> Vec<StepState> {
        self.read().steps.iter().map(|e| e.state).collect()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.read().snapshot()
    }

    pub fn status(&self) -> RunStatus {
        self.read().status
    }

    pub fn all_terminal(&self) -> bool {
        self.read().steps.iter().all(StepExecution::is_terminal)
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    /// Read-only handle for observers.
    pub fn view(&self) -> RunView {
        RunView {
            store: self.clone(),
        }
    }

    /// Move `step` to `to`, enforcing the step state machine.
    pub fn transition_to(
        &self,
        step: &str,
        to: StepState,
        details: TransitionDetails,
    ) -> Result<(), StoreError> {
        let mut rec = self.write();
        let idx = *rec
            .by_name
            .get(step)
            .ok_or_else(|| StoreError::UnknownStep(step.to_string()))?;

        let exec = &mut rec.steps[idx];
        let from = exec.state;

        if exec.is_terminal() || !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                step: step.to_string(),
                from,
                to,
            });
        }

        let now = Utc::now();
        match to {
            StepState::Running => {
                exec.attempt += 1;
                exec.started_at = Some(now);
                exec.finished_at = None;
                exec.exit_code = None;
                exec.failure = None;
                exec.output = None;
            }
            StepState::Pending => {
                // Failed -> Pending: consume one retry.
                exec.retry_count += 1;
                exec.finished_at = None;
            }
            _ => {
                exec.finished_at = Some(now);
            }
        }

        if details.exit_code.is_some() {
            exec.exit_code = details.exit_code;
        }
        if details.failure.is_some() {
            exec.failure = details.failure.clone();
        }
        if details.output.is_some() {
            exec.output = details.output.clone();
        }
        exec.state = to;

        trace!(step = %step, %from, %to, attempt = exec.attempt, "step transition");

        self.feed.append(
            FeedEventKind::StepTransition {
                step: step.to_string(),
                from,
                to,
                detail: details.feed_detail(),
            },
            now,
        );
        Ok(())
    }

    /// Update the run-level status. Terminal statuses are sticky.
    pub fn set_run_status(&self, to: RunStatus) {
        let mut rec = self.write();
        let from = rec.status;
        if from == to || from.is_terminal() {
            return;
        }

        let now = Utc::now();
        if to == RunStatus::Running && rec.started_at.is_none() {
            rec.started_at = Some(now);
        }
        if to.is_terminal() {
            rec.finished_at = Some(now);
        }
        rec.status = to;

        debug!(run_id = %rec.run_id, %from, %to, "run status changed");
        self.feed
            .append(FeedEventKind::RunStatusChanged { from, to }, now);
    }

    fn read(&self) -> RwLockReadGuard<'_, RunRecord> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunRecord> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of a run, handed to CLI/dashboard collaborators.
///
/// Exposes no way to mutate step or run state.
#[derive(Debug, Clone)]
pub struct RunView {
    store: RunStateStore,
}

impl RunView {
    pub fn run_id(&self) -> RunId {
        self.store.run_id()
    }

    pub fn get(&self, step: &str) -> Option<StepExecution> {
        self.store.get(step)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.store.snapshot()
    }

    pub fn status(&self) -> RunStatus {
        self.store.status()
    }

    pub fn is_finished(&self) -> bool {
        self.store.status().is_terminal()
    }

    pub fn feed(&self) -> &EventFeed {
        self.store.feed()
    }
}
