// src/state/mod.rs

//! Run state: the step state machine and the concurrency-safe store that
//! enforces it.
//!
//! - [`execution`] defines [`StepState`], [`StepExecution`] and [`RunStatus`].
//! - [`store`] defines [`RunStateStore`] (mutation path, owned by the
//!   scheduler) and [`RunView`] (read-only observation path).

pub mod execution;
pub mod store;

pub use execution::{RunSnapshot, RunStatus, StepExecution, StepState, TransitionDetails};
pub use store::{RunStateStore, RunView};
