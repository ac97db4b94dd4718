// src/exec/mod.rs

//! Step execution layer.
//!
//! The engine only knows the [`Executor`] contract: run one step's script
//! against its target, honour cooperative cancellation, report an
//! [`Outcome`].
//!
//! - [`backend`] provides the `Executor` trait, the per-attempt
//!   [`ExecutionContext`] and the cancellation plumbing.
//! - [`shell`] provides [`ShellExecutor`], which runs scripts as local
//!   processes. Remote transports are left to other implementations.

pub mod backend;
pub mod shell;

pub use backend::{
    cancel_pair, CancelHandle, CancelSignal, ExecFuture, ExecutionContext, Executor, ExitStatus,
    Outcome,
};
pub use shell::ShellExecutor;
