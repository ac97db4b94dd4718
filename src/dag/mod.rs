// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] validates a plan and builds its dependency graph.
//! - [`scheduler`] contains the per-run decision core that picks ready
//!   steps, applies retries and propagates failures.
//! - [`readiness`] decides whether a step's dependencies are satisfied.
//! - [`budget`] is the concurrency permit pool.
//! - [`scheduler_step`] defines the result types for scheduler steps.

pub mod budget;
pub mod graph;
pub mod readiness;
pub mod scheduler;
pub mod scheduler_step;

pub use budget::ConcurrencyBudget;
pub use graph::{build_graph, DependencyGraph};
pub use readiness::DependencyStatus;
pub use scheduler::Scheduler;
pub use scheduler_step::{DispatchedStep, SchedulerStep};
