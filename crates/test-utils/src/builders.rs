use std::time::Duration;

use rcubic::plan::{Plan, PlanSettings, StepSpec};

/// Builder for `Plan` to simplify test setup.
pub struct PlanBuilder {
    settings: PlanSettings,
    steps: Vec<StepSpec>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            settings: PlanSettings {
                name: "test-plan".to_string(),
                // Keep abort tests fast.
                abort_grace: Duration::from_millis(200),
                ..PlanSettings::default()
            },
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.settings.name = name.to_string();
        self
    }

    pub fn tiers(mut self, tiers: &[&str]) -> Self {
        self.settings.tiers = tiers.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn independent_tiers(mut self, val: bool) -> Self {
        self.settings.independent_tiers = val;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.settings.max_concurrency = n;
        self
    }

    pub fn default_retries(mut self, n: u32) -> Self {
        self.settings.default_retries = n;
        self
    }

    pub fn default_timeout(mut self, d: Duration) -> Self {
        self.settings.default_timeout = Some(d);
        self
    }

    pub fn abort_grace(mut self, d: Duration) -> Self {
        self.settings.abort_grace = d;
        self
    }

    pub fn skip_satisfies_dependents(mut self, val: bool) -> Self {
        self.settings.skip_satisfies_dependents = val;
        self
    }

    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    /// Build, returning the validation error if the plan is malformed.
    pub fn try_build(self) -> Result<Plan, rcubic::errors::PlanError> {
        Plan::new(self.settings, self.steps)
    }

    pub fn build(self) -> Plan {
        self.try_build()
            .expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepSpec`.
pub struct StepBuilder {
    step: StepSpec,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            step: StepSpec::new(name, format!("echo {name}")),
        }
    }

    pub fn script(mut self, script: &str) -> Self {
        self.step.script = script.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn tier(mut self, tier: &str) -> Self {
        self.step.tier = Some(tier.to_string());
        self
    }

    pub fn priority(mut self, p: i32) -> Self {
        self.step.priority = p;
        self
    }

    pub fn timeout(mut self, d: Duration) -> Self {
        self.step.timeout = Some(d);
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.step.retries = Some(n);
        self
    }

    pub fn critical(mut self, val: bool) -> Self {
        self.step.critical = Some(val);
        self
    }

    pub fn skip(mut self) -> Self {
        self.step.skip = true;
        self
    }

    pub fn build(self) -> StepSpec {
        self.step
    }
}

/// Shorthand for a step with only `after` edges.
pub fn step(name: &str, after: &[&str]) -> StepSpec {
    after
        .iter()
        .fold(StepBuilder::new(name), |b, dep| b.after(dep))
        .build()
}
