// src/plan/mod.rs

//! Immutable plan model.
//!
//! A [`Plan`] is built once, validated, and then shared read-only between the
//! graph builder, the scheduler and the executors. Amending a plan means
//! building a new one.
//!
//! - [`model`] holds the resolved types ([`Plan`], [`Step`], [`Tier`]).
//! - [`spec`] holds the loosely-specified inputs ([`StepSpec`],
//!   [`PlanSettings`]) that [`Plan::new`] validates and resolves.

pub mod model;
pub mod spec;

pub use model::{Plan, Step, Tier, DEFAULT_TIER};
pub use spec::{PlanSettings, StepSpec};
