// src/checkin.rs

//! Plan check-in: validate a plan document before it is accepted for a run.
//!
//! This is the contract the submission tooling relies on: a plan that
//! passes [`check_plan`] will be accepted by [`crate::engine::Engine::submit`].

use std::fmt;
use std::path::Path;

use crate::config::load_plan;
use crate::dag::build_graph;
use crate::errors::{PlanError, Result};
use crate::plan::Plan;
use crate::types::StepName;

/// Summary of a validated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub plan: String,
    pub step_count: usize,
    /// Tier names with their steps, in tier order.
    pub tiers: Vec<(String, Vec<StepName>)>,
    pub independent_tiers: bool,
    pub roots: Vec<StepName>,
    pub topological_order: Vec<StepName>,
}

/// Validate an already-loaded plan.
pub fn check_plan(plan: &Plan) -> std::result::Result<CheckReport, PlanError> {
    let graph = build_graph(plan)?;

    let tiers = plan
        .tiers()
        .iter()
        .map(|t| {
            let steps = plan
                .steps()
                .iter()
                .filter(|s| s.tier == t.name)
                .map(|s| s.name.clone())
                .collect();
            (t.name.clone(), steps)
        })
        .collect();

    Ok(CheckReport {
        plan: plan.name().to_string(),
        step_count: plan.len(),
        tiers,
        independent_tiers: plan.settings().independent_tiers,
        roots: graph.roots().into_iter().map(String::from).collect(),
        topological_order: graph
            .topological_order()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Load a plan document from disk and validate it.
pub fn check_plan_file(path: impl AsRef<Path>) -> Result<CheckReport> {
    let plan = load_plan(path)?;
    Ok(check_plan(&plan)?)
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plan '{}' ok: {} step(s)", self.plan, self.step_count)?;
        let tier_mode = if self.independent_tiers {
            "independent"
        } else {
            "ordered"
        };
        writeln!(f, "tiers ({tier_mode}):")?;
        for (tier, steps) in &self.tiers {
            writeln!(f, "  - {tier}: {}", steps.join(", "))?;
        }
        writeln!(f, "roots: {}", self.roots.join(", "))?;
        write!(f, "order: {}", self.topological_order.join(" -> "))
    }
}
