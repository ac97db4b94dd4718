// src/config/model.rs

use serde::Deserialize;

/// Top-level plan document as read from a TOML file.
///
/// ```toml
/// [plan]
/// name = "release"
/// tiers = ["staging", "production"]
/// max_concurrency = 2
/// default_timeout = "30m"
///
/// [[step]]
/// name = "migrate"
/// script = "scripts/migrate.sh"
/// tier = "staging"
///
/// [[step]]
/// name = "deploy"
/// script = "scripts/deploy.sh"
/// tier = "production"
/// after = ["migrate"]
/// retries = 1
/// ```
///
/// Steps are an array of tables so that declaration order survives
/// deserialization; the scheduler uses it as a tie-break.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPlanFile {
    /// Global settings from `[plan]`.
    #[serde(default)]
    pub plan: PlanSection,

    /// All steps from `[[step]]`, in declaration order.
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// `[plan]` section.
///
/// Durations are humantime strings (`"90s"`, `"5m"`, `"1h 30m"`).
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSection {
    #[serde(default = "default_plan_name")]
    pub name: String,

    #[serde(default)]
    pub tiers: Vec<String>,

    #[serde(default)]
    pub independent_tiers: bool,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub default_timeout: Option<String>,

    #[serde(default)]
    pub default_retries: u32,

    #[serde(default = "default_abort_grace")]
    pub abort_grace: String,

    #[serde(default = "default_true")]
    pub skip_satisfies_dependents: bool,
}

fn default_plan_name() -> String {
    "plan".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_abort_grace() -> String {
    "10s".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            name: default_plan_name(),
            tiers: Vec::new(),
            independent_tiers: false,
            max_concurrency: default_max_concurrency(),
            default_timeout: None,
            default_retries: 0,
            abort_grace: default_abort_grace(),
            skip_satisfies_dependents: true,
        }
    }
}

/// `[[step]]` entry.
///
/// `name` and `script` default to empty so that a missing field is reported
/// as a malformed plan naming the step rather than a bare serde error.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub name: String,

    /// Script or command to run (`sh -c` for the shell executor).
    #[serde(default)]
    pub script: String,

    #[serde(default)]
    pub tier: Option<String>,

    /// Steps that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub timeout: Option<String>,

    /// Falls back to `[plan].default_retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Defaults to `true`.
    #[serde(default)]
    pub critical: Option<bool>,

    #[serde(default)]
    pub skip: bool,
}
