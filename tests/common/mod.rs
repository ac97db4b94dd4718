#![allow(dead_code)]

use std::sync::Arc;

use rcubic::dag::{build_graph, Scheduler};
use rcubic::engine::StepOutcome;
use rcubic::errors::StepFailure;
use rcubic::plan::Plan;
use rcubic::state::RunStateStore;
use rcubic::types::RunId;

pub use rcubic_test_utils::builders;
pub use rcubic_test_utils::init_tracing;

/// Build a scheduler for `plan` using the plan's own concurrency limit.
pub fn scheduler_for(plan: Plan) -> Scheduler {
    let max = plan.settings().max_concurrency;
    scheduler_with_limit(plan, max)
}

pub fn scheduler_with_limit(plan: Plan, max_concurrency: usize) -> Scheduler {
    let graph = build_graph(&plan).expect("plan should build a valid graph");
    let store = RunStateStore::new(RunId::new(), &plan);
    Scheduler::new(Arc::new(plan), Arc::new(graph), store, max_concurrency)
}

pub fn ok() -> StepOutcome {
    StepOutcome::success()
}

pub fn exit(code: i32) -> StepOutcome {
    StepOutcome::failure(StepFailure::Exit(code))
}

pub fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

pub fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
