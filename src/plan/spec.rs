// src/plan/spec.rs

use std::time::Duration;

use crate::types::StepName;

/// Global plan settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSettings {
    /// Human-readable plan name, used in logs and reports.
    pub name: String,
    /// Tier names in execution order (e.g. `["staging", "production"]`).
    ///
    /// Empty means every step lives in the implicit [`super::DEFAULT_TIER`].
    pub tiers: Vec<String>,
    /// If true, tiers impose no ordering; only explicit `after` edges count.
    pub independent_tiers: bool,
    /// Timeout applied to steps that do not declare one.
    pub default_timeout: Option<Duration>,
    /// Retry count applied to steps that do not declare one.
    pub default_retries: u32,
    /// Maximum number of steps in `Running` at once.
    pub max_concurrency: usize,
    /// How long in-flight steps get to honour an abort before they are
    /// marked `Aborted` regardless.
    pub abort_grace: Duration,
    /// Whether a `Skipped` dependency counts as satisfied.
    pub skip_satisfies_dependents: bool,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            name: "plan".to_string(),
            tiers: Vec::new(),
            independent_tiers: false,
            default_timeout: None,
            default_retries: 0,
            max_concurrency: 4,
            abort_grace: Duration::from_secs(10),
            skip_satisfies_dependents: true,
        }
    }
}

/// A step as declared, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: StepName,
    pub script: String,
    pub tier: Option<String>,
    pub after: Vec<StepName>,
    pub priority: i32,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub critical: Option<bool>,
    pub skip: bool,
}

impl StepSpec {
    pub fn new(name: impl Into<StepName>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            tier: None,
            after: Vec::new(),
            priority: 0,
            timeout: None,
            retries: None,
            critical: None,
            skip: false,
        }
    }
}
