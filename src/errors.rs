// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PlanError`]: plan-load failures. Fatal to that load; no run starts.
//! - [`StoreError`]: rejected state-store mutations (invariant violations).
//! - [`StepFailure`]: why a single step attempt failed. Recorded per step and
//!   drives retry/propagation; never fatal to the engine.
//! - [`RcubicError`]: umbrella error for the loaders and the runtime shell.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::state::StepState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("step '{step}' depends on unknown step '{missing}'")]
    UnknownDependency { step: String, missing: String },

    #[error("cyclic dependency between steps: {}", .steps.join(", "))]
    CyclicDependency { steps: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid transition for step '{step}': {from} -> {to}")]
    InvalidTransition {
        step: String,
        from: StepState,
        to: StepState,
    },

    #[error("unknown step: {0}")]
    UnknownStep(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFailure {
    #[error("script exited with status {0}")]
    Exit(i32),

    #[error("execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum RcubicError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RcubicError>;
