// src/dag/readiness.rs

//! Dependency satisfaction for the ready-set computation.

use crate::dag::DependencyGraph;
use crate::plan::Plan;
use crate::state::StepState;

/// Aggregate status of a step's dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// Every dependency reached a state that lets dependents run.
    Satisfied,
    /// At least one dependency has not finished yet.
    Waiting,
    /// At least one dependency can never satisfy this step.
    Broken,
}

/// Read-only view over a consistent set of step states (declaration order).
pub struct Readiness<'a> {
    plan: &'a Plan,
    graph: &'a DependencyGraph,
    states: &'a [StepState],
}

impl<'a> Readiness<'a> {
    pub fn new(plan: &'a Plan, graph: &'a DependencyGraph, states: &'a [StepState]) -> Self {
        Self {
            plan,
            graph,
            states,
        }
    }

    /// What a single finished (or unfinished) dependency means for its
    /// dependents.
    pub fn dependency_effect(&self, dep: usize) -> DependencyStatus {
        match self.states[dep] {
            StepState::Succeeded => DependencyStatus::Satisfied,
            StepState::Skipped => {
                if self.plan.settings().skip_satisfies_dependents {
                    DependencyStatus::Satisfied
                } else {
                    DependencyStatus::Broken
                }
            }
            // The scheduler retries before anyone can observe a retryable
            // failure, so `Failed` here is final.
            StepState::Failed => {
                if self.plan.steps()[dep].critical {
                    DependencyStatus::Broken
                } else {
                    DependencyStatus::Satisfied
                }
            }
            StepState::Blocked | StepState::Aborted => DependencyStatus::Broken,
            StepState::Pending | StepState::Running => DependencyStatus::Waiting,
        }
    }

    pub fn status_of(&self, index: usize) -> DependencyStatus {
        let mut status = DependencyStatus::Satisfied;
        for &dep in self.graph.deps_idx(index) {
            match self.dependency_effect(dep) {
                DependencyStatus::Broken => return DependencyStatus::Broken,
                DependencyStatus::Waiting => status = DependencyStatus::Waiting,
                DependencyStatus::Satisfied => {}
            }
        }
        status
    }

    /// Pending steps whose dependencies are satisfied, in dispatch order:
    /// lowest priority value first, then declaration order.
    pub fn ready(&self) -> Vec<usize> {
        let mut ready: Vec<usize> = (0..self.states.len())
            .filter(|&i| {
                self.states[i] == StepState::Pending
                    && self.status_of(i) == DependencyStatus::Satisfied
            })
            .collect();
        let steps = self.plan.steps();
        ready.sort_by_key(|&i| (steps[i].priority, steps[i].index));
        ready
    }
}
