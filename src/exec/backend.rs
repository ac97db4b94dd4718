// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The runtime talks to an [`Executor`] instead of spawning processes itself.
//! This keeps transport concerns (local shell, remote shell, SSH, ...) out of
//! the engine and makes it easy to swap in a fake executor in tests.
//!
//! - [`crate::exec::ShellExecutor`] is the local implementation used by the
//!   `rcubic` binary.
//! - Tests provide their own `Executor` that, for example, records which
//!   steps were run and returns scripted outcomes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;

use crate::errors::Result;
use crate::plan::Step;
use crate::types::{OutputRef, RunId};

/// How a script finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failed(i32),
    /// Stopped because cancellation was requested.
    Cancelled,
}

/// What an executor reports for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: ExitStatus,
    pub output: Option<OutputRef>,
}

impl Outcome {
    pub fn new(status: ExitStatus) -> Self {
        Self {
            status,
            output: None,
        }
    }

    pub fn with_output(mut self, output: OutputRef) -> Self {
        self.output = Some(output);
        self
    }
}

/// Receiving side of a cooperative cancellation request.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// requesting side goes away without cancelling.
    pub async fn cancelled(&mut self) {
        let requested = self.rx.wait_for(|c| *c).await.map(|_| ()).is_ok();
        if !requested {
            std::future::pending::<()>().await;
        }
    }
}

/// Sending side of a cancellation request.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Ignored if the step already finished and dropped its signal.
        let _ = self.tx.send(true);
    }
}

/// Create a linked cancel handle / signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Per-attempt context handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: RunId,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Honour this to stop early when the run is aborted.
    pub cancel: CancelSignal,
}

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome>> + Send + 'a>>;

/// Trait abstracting how a step's script reaches its target.
///
/// The call may be slow and may be cancelled. An `Err` is treated as a step
/// failure, never as an engine failure.
pub trait Executor: Send + Sync + 'static {
    fn execute<'a>(&'a self, step: &'a Step, ctx: ExecutionContext) -> ExecFuture<'a>;
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => f.write_str("success"),
            ExitStatus::Failed(code) => write!(f, "failed ({code})"),
            ExitStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}
