// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::DispatchedStep;
use crate::errors::{Result, StepFailure};
use crate::exec::{cancel_pair, CancelHandle, ExecutionContext, Executor, ExitStatus};
use crate::state::{RunSnapshot, RunView};
use crate::types::StepName;

use super::core::CoreRuntime;
use super::{CoreCommand, RunEvent, StepOutcome};

/// Handle for a step attempt that is currently executing.
struct InFlight {
    attempt: u32,
    cancel: CancelHandle,
}

/// Drives one run's scheduler in response to [`RunEvent`]s and delegates
/// step execution to an [`Executor`].
///
/// This is a pure IO shell around [`CoreRuntime`], which contains all the
/// run semantics. Each dispatched step runs in its own Tokio task; its
/// result comes back over the run channel, so the scheduler only ever sees
/// one event at a time.
pub struct Runtime<E: Executor> {
    core: CoreRuntime,
    event_tx: mpsc::Sender<RunEvent>,
    event_rx: mpsc::Receiver<RunEvent>,
    executor: Arc<E>,
    in_flight: HashMap<StepName, InFlight>,
}

impl<E: Executor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("in_flight", &self.in_flight.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Runtime<E> {
    /// `event_tx` must be the sending side of `event_rx` (see
    /// [`super::run_channel`]); spawned steps report through it.
    pub fn new(
        core: CoreRuntime,
        event_tx: mpsc::Sender<RunEvent>,
        event_rx: mpsc::Receiver<RunEvent>,
        executor: Arc<E>,
    ) -> Self {
        Self {
            core,
            event_tx,
            event_rx,
            executor,
            in_flight: HashMap::new(),
        }
    }

    pub fn view(&self) -> RunView {
        self.core.view()
    }

    /// Main event loop.
    ///
    /// - Starts the run and dispatches the initial ready set.
    /// - Consumes `RunEvent`s, feeds them into the core and executes the
    ///   commands it returns.
    /// - Returns the final snapshot once the run is terminal.
    pub async fn run(mut self) -> Result<RunSnapshot> {
        let run_id = self.core.run_id();
        info!(run_id = %run_id, "run runtime started");

        let step = self.core.start();
        for command in step.commands {
            self.execute_command(command);
        }
        let mut keep_running = step.keep_running;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!(run_id = %run_id, "run event channel closed before the run finished");
                    break;
                }
            };

            debug!(run_id = %run_id, ?event, "runtime received event");

            if let RunEvent::StepFinished { step, attempt, .. } = &event {
                self.forget_in_flight(step, *attempt);
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }
            keep_running = step.keep_running;
        }

        // Anything still tracked was abandoned by the grace timer; make sure
        // it gets the signal even if its executor ignores it.
        for (_, flight) in self.in_flight.drain() {
            flight.cancel.cancel();
        }

        let snapshot = self.core.view().snapshot();
        info!(run_id = %run_id, status = %snapshot.status, "run runtime exiting");
        Ok(snapshot)
    }

    /// Execute a single command from the core.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::Dispatch(steps) => {
                for step in steps {
                    self.spawn_step(step);
                }
            }
            CoreCommand::Cancel(names) => {
                for name in names {
                    match self.in_flight.get(&name) {
                        Some(flight) => {
                            debug!(step = %name, attempt = flight.attempt, "signalling cancellation");
                            flight.cancel.cancel();
                        }
                        None => debug!(step = %name, "cancel for step not in flight"),
                    }
                }
            }
            CoreCommand::StartGraceTimer(grace) => {
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let _ = tx.send(RunEvent::GraceExpired).await;
                });
            }
        }
    }

    fn spawn_step(&mut self, dispatched: DispatchedStep) {
        let (cancel, signal) = cancel_pair();
        let name = dispatched.step.name.clone();
        let attempt = dispatched.attempt;

        self.in_flight
            .insert(name.clone(), InFlight { attempt, cancel });

        let ctx = ExecutionContext {
            run_id: dispatched.run_id,
            attempt,
            cancel: signal,
        };
        let executor = Arc::clone(&self.executor);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            // The attempt runs in its own task so a panicking executor still
            // produces a completion.
            let step = dispatched.step;
            let attempt_task = tokio::spawn(async move {
                execute_with_timeout(executor.as_ref(), &step, ctx, step.timeout).await
            });
            let outcome = match attempt_task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(step = %name, attempt, error = %err, "executor task failed");
                    StepOutcome::failure(StepFailure::Executor("executor panicked".to_string()))
                }
            };
            debug!(step = %name, attempt, success = outcome.is_success(), "step attempt finished");
            let _ = tx
                .send(RunEvent::StepFinished {
                    step: name,
                    attempt,
                    outcome,
                })
                .await;
        });
    }

    fn forget_in_flight(&mut self, step: &str, attempt: u32) {
        if self
            .in_flight
            .get(step)
            .is_some_and(|f| f.attempt == attempt)
        {
            self.in_flight.remove(step);
        }
    }
}

/// Run one attempt, translating the executor's answer (or a timeout) into a
/// [`StepOutcome`]. Never fails: executor errors become step failures.
async fn execute_with_timeout<E: Executor>(
    executor: &E,
    step: &crate::plan::Step,
    ctx: ExecutionContext,
    timeout: Option<Duration>,
) -> StepOutcome {
    let fut = executor.execute(step, ctx);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(r) => r,
            Err(_) => {
                warn!(step = %step.name, timeout = ?limit, "step exceeded its timeout");
                return StepOutcome::failure(StepFailure::ExecutionTimeout(limit));
            }
        },
        None => fut.await,
    };

    match result {
        Ok(outcome) => match outcome.status {
            ExitStatus::Success => StepOutcome::Succeeded {
                exit_code: Some(0),
                output: outcome.output,
            },
            ExitStatus::Failed(code) => StepOutcome::Failed {
                failure: StepFailure::Exit(code),
                exit_code: Some(code),
                output: outcome.output,
            },
            ExitStatus::Cancelled => StepOutcome::Failed {
                failure: StepFailure::Cancelled,
                exit_code: None,
                output: outcome.output,
            },
        },
        Err(err) => {
            warn!(step = %step.name, error = %err, "executor error");
            StepOutcome::failure(StepFailure::Executor(err.to_string()))
        }
    }
}
