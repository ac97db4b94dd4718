// src/config/mod.rs

//! Plan document loading.
//!
//! Responsibilities:
//! - Define the TOML-backed document model (`model.rs`).
//! - Load a document from disk (`loader.rs`).
//! - Convert it into a validated [`crate::plan::Plan`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_from_path, load_plan, parse_str};
pub use model::{PlanSection, RawPlanFile, StepConfig};
