// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::RawPlanFile;
use crate::errors::Result;
use crate::plan::Plan;

/// Load a plan document from a given path and return the raw `RawPlanFile`.
///
/// This only performs TOML deserialization; it does **not** check required
/// fields, dependencies or cycles. Use [`load_plan`] for the first and
/// [`crate::dag::build_graph`] for the rest.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Parse a plan document from a TOML string.
pub fn parse_str(contents: &str) -> Result<RawPlanFile> {
    let raw: RawPlanFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Load a plan document and convert it into a validated [`Plan`].
///
/// Rejects documents with missing required fields (`MalformedPlan`).
pub fn load_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let plan = Plan::try_from(raw)?;
    debug!(path = ?path, plan = %plan.name(), "plan document loaded");
    Ok(plan)
}

/// Default plan document location: `rcubic.toml` in the working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("rcubic.toml")
}
