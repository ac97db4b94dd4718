use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rcubic::exec::{ExecFuture, ExecutionContext, Executor, ExitStatus, Outcome};
use rcubic::plan::Step;
use rcubic::types::OutputRef;

/// What a scripted step does on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Exit 0 after the step's delay.
    Succeed,
    /// Exit with this non-zero code after the step's delay.
    Exit(i32),
    /// Report an executor error (transport failure).
    Error(String),
    /// Run until cancelled, then report `Cancelled`.
    HangUntilCancelled,
    /// Run forever, ignoring cancellation.
    IgnoreCancel,
    /// Panic inside the executor after the step's delay.
    Panic,
}

#[derive(Debug, Default)]
struct Record {
    started: Vec<(String, u32)>,
    finished: Vec<(String, u32)>,
    running: usize,
    max_running: usize,
}

/// A fake executor that:
/// - returns scripted outcomes per step and attempt (the last entry repeats)
/// - optionally sleeps per step before answering
/// - records start/finish order and the peak number of concurrent attempts.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    scripts: Arc<Mutex<HashMap<String, Vec<Scripted>>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    default_delay: Duration,
    record: Arc<Mutex<Record>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every step without its own delay sleeps this long.
    pub fn with_default_delay(mut self, d: Duration) -> Self {
        self.default_delay = d;
        self
    }

    pub fn script(self, step: &str, outcomes: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(step.to_string(), outcomes);
        self
    }

    pub fn delay(self, step: &str, d: Duration) -> Self {
        self.delays.lock().unwrap().insert(step.to_string(), d);
        self
    }

    /// Step names in the order attempts started.
    pub fn started(&self) -> Vec<String> {
        let rec = self.record.lock().unwrap();
        rec.started.iter().map(|(s, _)| s.clone()).collect()
    }

    /// `(step, attempt)` pairs in the order attempts started.
    pub fn attempts(&self) -> Vec<(String, u32)> {
        self.record.lock().unwrap().started.clone()
    }

    /// Step names in the order attempts finished (cancelled ones included).
    pub fn finished(&self) -> Vec<String> {
        let rec = self.record.lock().unwrap();
        rec.finished.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn max_concurrent(&self) -> usize {
        self.record.lock().unwrap().max_running
    }

    pub fn attempts_of(&self, step: &str) -> usize {
        let rec = self.record.lock().unwrap();
        rec.started.iter().filter(|(s, _)| s == step).count()
    }

    fn scripted_for(&self, step: &str, attempt: u32) -> Scripted {
        let scripts = self.scripts.lock().unwrap();
        match scripts.get(step) {
            Some(list) if !list.is_empty() => {
                let idx = (attempt as usize).saturating_sub(1).min(list.len() - 1);
                list[idx].clone()
            }
            _ => Scripted::Succeed,
        }
    }

    fn delay_for(&self, step: &str) -> Duration {
        self.delays
            .lock()
            .unwrap()
            .get(step)
            .copied()
            .unwrap_or(self.default_delay)
    }

    fn on_start(&self, step: &str, attempt: u32) -> RunningGuard {
        let mut rec = self.record.lock().unwrap();
        rec.started.push((step.to_string(), attempt));
        rec.running += 1;
        rec.max_running = rec.max_running.max(rec.running);
        RunningGuard {
            record: Arc::clone(&self.record),
            step: step.to_string(),
            attempt,
        }
    }
}

/// Marks an attempt finished when dropped, so attempts abandoned by a
/// timeout still count as no longer running.
struct RunningGuard {
    record: Arc<Mutex<Record>>,
    step: String,
    attempt: u32,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut rec = self.record.lock().unwrap();
        rec.finished.push((std::mem::take(&mut self.step), self.attempt));
        rec.running -= 1;
    }
}

impl Executor for ScriptedExecutor {
    fn execute<'a>(&'a self, step: &'a Step, mut ctx: ExecutionContext) -> ExecFuture<'a> {
        Box::pin(async move {
            let scripted = self.scripted_for(&step.name, ctx.attempt);
            let delay = self.delay_for(&step.name);
            let _running = self.on_start(&step.name, ctx.attempt);

            let status = match scripted {
                Scripted::HangUntilCancelled => {
                    ctx.cancel.cancelled().await;
                    ExitStatus::Cancelled
                }
                Scripted::IgnoreCancel => {
                    std::future::pending::<()>().await;
                    ExitStatus::Cancelled
                }
                other => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancel.cancelled() => {
                            return Ok(Outcome::new(ExitStatus::Cancelled));
                        }
                    }
                    match other {
                        Scripted::Succeed => ExitStatus::Success,
                        Scripted::Exit(code) => ExitStatus::Failed(code),
                        Scripted::Error(msg) => return Err(anyhow::anyhow!(msg).into()),
                        Scripted::Panic => panic!("scripted executor panic in '{}'", step.name),
                        _ => unreachable!("hanging variants handled above"),
                    }
                }
            };

            let output = OutputRef(format!("fake://{}/{}", step.name, ctx.attempt));
            Ok(Outcome::new(status).with_output(output))
        })
    }
}
