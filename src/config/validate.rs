// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{PlanSection, RawPlanFile, StepConfig};
use crate::errors::PlanError;
use crate::plan::{Plan, PlanSettings, StepSpec};

impl TryFrom<RawPlanFile> for Plan {
    type Error = PlanError;

    fn try_from(raw: RawPlanFile) -> Result<Self, Self::Error> {
        let settings = settings_from_section(raw.plan)?;
        let steps = raw
            .step
            .into_iter()
            .map(step_spec_from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Plan::new(settings, steps)
    }
}

fn settings_from_section(section: PlanSection) -> Result<PlanSettings, PlanError> {
    let default_timeout = section
        .default_timeout
        .as_deref()
        .map(|s| parse_duration("[plan].default_timeout", s))
        .transpose()?;
    let abort_grace = parse_duration("[plan].abort_grace", &section.abort_grace)?;

    Ok(PlanSettings {
        name: section.name,
        tiers: section.tiers,
        independent_tiers: section.independent_tiers,
        default_timeout,
        default_retries: section.default_retries,
        max_concurrency: section.max_concurrency,
        abort_grace,
        skip_satisfies_dependents: section.skip_satisfies_dependents,
    })
}

fn step_spec_from_config(cfg: StepConfig) -> Result<StepSpec, PlanError> {
    let timeout = match cfg.timeout.as_deref() {
        Some(s) => Some(parse_duration(&format!("step '{}' timeout", cfg.name), s)?),
        None => None,
    };

    Ok(StepSpec {
        name: cfg.name,
        script: cfg.script,
        tier: cfg.tier,
        after: cfg.after,
        priority: cfg.priority,
        timeout,
        retries: cfg.retries,
        critical: cfg.critical,
        skip: cfg.skip,
    })
}

fn parse_duration(field: &str, s: &str) -> Result<Duration, PlanError> {
    humantime::parse_duration(s.trim())
        .map_err(|e| PlanError::MalformedPlan(format!("{field}: invalid duration '{s}': {e}")))
}
