// src/plan/model.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::debug;

use crate::errors::PlanError;
use crate::plan::spec::{PlanSettings, StepSpec};
use crate::types::StepName;

/// Tier used when a plan declares no tiers.
pub const DEFAULT_TIER: &str = "default";

/// A named ordering bucket. Lower `rank` runs first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub name: String,
    pub rank: usize,
}

/// One resolved, validated unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: StepName,
    /// Script or command reference handed to the executor.
    pub script: String,
    pub tier: String,
    /// Explicit dependencies (deduplicated, declaration order kept).
    pub after: Vec<StepName>,
    /// Dispatch tie-break; lower values go first.
    pub priority: i32,
    pub timeout: Option<Duration>,
    /// Automatic re-dispatches allowed after a failure.
    pub retries: u32,
    /// Whether a terminal failure blocks all transitive dependents.
    pub critical: bool,
    /// Steps marked `skip` are moved straight to `Skipped` at run start.
    pub skip: bool,
    /// Position in the plan's declaration order.
    pub index: usize,
}

/// An ordered, immutable collection of steps plus global settings.
#[derive(Debug, Clone)]
pub struct Plan {
    settings: PlanSettings,
    tiers: Vec<Tier>,
    steps: Vec<Step>,
    by_name: HashMap<StepName, usize>,
}

impl Plan {
    /// Validate the required fields and resolve defaults.
    ///
    /// Dependency references and cycles are *not* checked here; that is the
    /// job of [`crate::dag::build_graph`].
    pub fn new(settings: PlanSettings, specs: Vec<StepSpec>) -> Result<Self, PlanError> {
        if specs.is_empty() {
            return Err(malformed("plan must contain at least one step"));
        }
        if settings.max_concurrency == 0 {
            return Err(malformed("max_concurrency must be >= 1 (got 0)"));
        }

        let tiers = resolve_tiers(&settings)?;
        let tier_names: HashSet<&str> = tiers.iter().map(|t| t.name.as_str()).collect();

        let mut steps = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::with_capacity(specs.len());

        for (index, spec) in specs.into_iter().enumerate() {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                return Err(malformed(format!("step #{} has no name", index + 1)));
            }
            if spec.script.trim().is_empty() {
                return Err(malformed(format!("step '{name}' has no script")));
            }
            if by_name.contains_key(&name) {
                return Err(malformed(format!("duplicate step name '{name}'")));
            }

            let tier = match (spec.tier.map(|t| t.trim().to_string()), settings.tiers.is_empty()) {
                (None, true) => DEFAULT_TIER.to_string(),
                (Some(t), true) if t == DEFAULT_TIER => t,
                (Some(t), true) => {
                    return Err(malformed(format!(
                        "step '{name}' targets tier '{t}' but the plan declares no tiers"
                    )));
                }
                (None, false) => {
                    return Err(malformed(format!("step '{name}' has no tier")));
                }
                (Some(t), false) => {
                    if !tier_names.contains(t.as_str()) {
                        return Err(malformed(format!(
                            "step '{name}' targets unknown tier '{t}'"
                        )));
                    }
                    t
                }
            };

            let mut seen = HashSet::new();
            let after = spec
                .after
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| seen.insert(d.clone()))
                .collect();

            by_name.insert(name.clone(), index);
            steps.push(Step {
                name,
                script: spec.script,
                tier,
                after,
                priority: spec.priority,
                timeout: spec.timeout.or(settings.default_timeout),
                retries: spec.retries.unwrap_or(settings.default_retries),
                critical: spec.critical.unwrap_or(true),
                skip: spec.skip,
                index,
            });
        }

        debug!(plan = %settings.name, steps = steps.len(), tiers = tiers.len(), "plan loaded");

        Ok(Self {
            settings,
            tiers,
            steps,
            by_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.by_name.get(name).map(|&i| &self.steps[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Tiers in execution order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn tier_rank(&self, tier: &str) -> Option<usize> {
        self.tiers.iter().find(|t| t.name == tier).map(|t| t.rank)
    }
}

fn resolve_tiers(settings: &PlanSettings) -> Result<Vec<Tier>, PlanError> {
    if settings.tiers.is_empty() {
        return Ok(vec![Tier {
            name: DEFAULT_TIER.to_string(),
            rank: 0,
        }]);
    }

    let mut seen = HashSet::new();
    let mut tiers = Vec::with_capacity(settings.tiers.len());
    for (rank, name) in settings.tiers.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            return Err(malformed(format!("tier #{} has an empty name", rank + 1)));
        }
        if !seen.insert(name) {
            return Err(malformed(format!("duplicate tier '{name}'")));
        }
        tiers.push(Tier {
            name: name.to_string(),
            rank,
        });
    }
    Ok(tiers)
}

fn malformed(msg: impl Into<String>) -> PlanError {
    PlanError::MalformedPlan(msg.into())
}
