// src/exec/shell.rs

//! Local shell executor.
//!
//! Runs a step's script with `sh -c` (`cmd /C` on Windows), captures stdout
//! and stderr into one log file per attempt and reports the exit status.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::backend::{ExecFuture, ExecutionContext, Executor, ExitStatus, Outcome};
use crate::plan::Step;
use crate::types::OutputRef;

/// Executes steps as local shell processes.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    output_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl ShellExecutor {
    /// Logs land in `<output_dir>/<run_id>/<step>.<attempt>.log`; names with
    /// characters unsafe in file names become `<sanitized>@<index>`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            working_dir: None,
        }
    }

    /// Directory scripts run in (defaults to the current directory).
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn log_path(&self, step: &Step, ctx: &ExecutionContext) -> PathBuf {
        self.output_dir
            .join(ctx.run_id.to_string())
            .join(format!("{}.{}.log", log_stem(step), ctx.attempt))
    }

    async fn run(&self, step: &Step, mut ctx: ExecutionContext) -> Result<Outcome> {
        let log_path = self.log_path(step, &ctx);
        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating output directory {:?}", parent))?;
        }
        let log = tokio::fs::File::create(&log_path)
            .await
            .with_context(|| format!("creating log file {:?}", log_path))?;
        let log_err = log
            .try_clone()
            .await
            .with_context(|| format!("cloning log file handle {:?}", log_path))?;
        let log = log.into_std().await;
        let log_err = log_err.into_std().await;
        let output = OutputRef(log_path.display().to_string());

        info!(
            step = %step.name,
            run_id = %ctx.run_id,
            attempt = ctx.attempt,
            script = %step.script,
            "starting step process"
        );

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&step.script);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&step.script);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.env("RCUBIC_RUN_ID", ctx.run_id.to_string())
            .env("RCUBIC_STEP", &step.name)
            .env("RCUBIC_TIER", &step.tier)
            .env("RCUBIC_ATTEMPT", ctx.attempt.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for step '{}'", step.name))?;

        // Either the process exits on its own, or the run is aborted and we
        // kill it.
        tokio::select! {
            status_res = child.wait() => {
                let status = status_res.with_context(|| {
                    format!("waiting for process of step '{}'", step.name)
                })?;
                let code = status.code().unwrap_or(-1);

                info!(
                    step = %step.name,
                    run_id = %ctx.run_id,
                    exit_code = code,
                    success = status.success(),
                    "step process exited"
                );

                let status = if status.success() {
                    ExitStatus::Success
                } else {
                    ExitStatus::Failed(code)
                };
                Ok(Outcome::new(status).with_output(output))
            }

            _ = ctx.cancel.cancelled() => {
                info!(
                    step = %step.name,
                    run_id = %ctx.run_id,
                    "cancellation requested; killing step process"
                );
                if let Err(e) = child.kill().await {
                    warn!(
                        step = %step.name,
                        error = %e,
                        "failed to kill step process on cancellation"
                    );
                }
                debug!(step = %step.name, log = %output, "step process killed");
                Ok(Outcome::new(ExitStatus::Cancelled).with_output(output))
            }
        }
    }
}

impl Executor for ShellExecutor {
    fn execute<'a>(&'a self, step: &'a Step, ctx: ExecutionContext) -> ExecFuture<'a> {
        Box::pin(self.run(step, ctx))
    }
}

/// File stem for a step's logs. Names that needed rewriting get the step
/// index appended so `a/b` and `a_b` never share a file.
fn log_stem(step: &Step) -> String {
    let clean = sanitize(&step.name);
    if clean == step.name {
        clean
    } else {
        format!("{}@{}", clean, step.index)
    }
}

/// Keep step names usable as file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
