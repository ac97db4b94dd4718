// src/lib.rs

pub mod checkin;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod feed;
pub mod logging;
pub mod plan;
pub mod state;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::checkin::check_plan;
use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::load_plan;
use crate::engine::{Engine, EngineOptions};
use crate::exec::ShellExecutor;
use crate::feed::jsonl::spawn_jsonl_sink;
use crate::plan::Plan;
use crate::state::{RunSnapshot, RunStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and check-in
/// - the engine and the local shell executor
/// - the optional JSON-lines event log
/// - Ctrl-C handling (abort with grace period)
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run_args) => run_plan(run_args).await,
        Command::Check(plan_arg) => {
            let plan = load_plan(&plan_arg.plan)?;
            let report = check_plan(&plan)?;
            println!("{report}");
            Ok(())
        }
        Command::Show(plan_arg) => {
            let plan = load_plan(&plan_arg.plan)?;
            print_dry_run(&plan)
        }
    }
}

async fn run_plan(args: RunArgs) -> Result<()> {
    let plan_path = args.plan.plan;
    let plan = load_plan(&plan_path)?;

    let workdir = args
        .workdir
        .unwrap_or_else(|| plan_root_dir(&plan_path));
    let executor = ShellExecutor::new(args.output_dir).with_working_dir(workdir);

    let options = EngineOptions {
        max_concurrency: args.max_concurrency,
        abort_grace: None,
    };
    let engine = Engine::new(executor, options);
    let handle = engine.submit(plan)?;
    info!(run_id = %handle.run_id(), plan = ?plan_path, "run started");

    let sink = args
        .events
        .map(|path| spawn_jsonl_sink(handle.view().feed(), path));

    // Ctrl-C → abort with grace period.
    {
        let abort = handle.abort_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; aborting run");
            abort.abort().await;
        });
    }

    let snapshot = handle.wait().await?;

    if let Some(sink) = sink {
        match sink.await {
            Ok(result) => result?,
            Err(e) => warn!(error = %e, "event log writer task failed"),
        }
    }

    print_summary(&snapshot);

    if snapshot.status != RunStatus::Succeeded {
        bail!("run {} finished with status {}", snapshot.run_id, snapshot.status);
    }
    Ok(())
}

/// Scripts run relative to the plan document unless told otherwise.
///
/// A bare filename like "rcubic.toml" (parent = "") falls back to the
/// current working directory.
fn plan_root_dir(plan_path: &Path) -> PathBuf {
    match plan_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_summary(snapshot: &RunSnapshot) {
    println!("run {} ({}): {}", snapshot.run_id, snapshot.plan, snapshot.status);
    for exec in &snapshot.steps {
        let mut line = format!("  {:<24} {:<10}", exec.step, exec.state.to_string());
        if exec.attempt > 1 {
            line.push_str(&format!(" attempts={}", exec.attempt));
        }
        if let Some(code) = exec.exit_code {
            line.push_str(&format!(" exit={code}"));
        }
        if let Some(ref failure) = exec.failure {
            line.push_str(&format!(" ({failure})"));
        }
        if let Some(ref output) = exec.output {
            line.push_str(&format!(" log={output}"));
        }
        println!("{line}");
    }
}

/// Dry-run output: settings, tiers and the order steps would start in.
fn print_dry_run(plan: &Plan) -> Result<()> {
    let report = check_plan(plan)?;
    let settings = plan.settings();

    println!("rcubic dry-run: {}", plan.name());
    println!("  plan.max_concurrency = {}", settings.max_concurrency);
    println!("  plan.independent_tiers = {}", settings.independent_tiers);
    println!(
        "  plan.abort_grace = {}",
        humantime::format_duration(settings.abort_grace)
    );
    println!();

    println!("steps ({}):", plan.len());
    for step in plan.steps() {
        println!("  - {}", step.name);
        println!("      script: {}", step.script);
        println!("      tier: {}", step.tier);
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        if step.priority != 0 {
            println!("      priority: {}", step.priority);
        }
        if let Some(timeout) = step.timeout {
            println!("      timeout: {}", humantime::format_duration(timeout));
        }
        if step.retries > 0 {
            println!("      retries: {}", step.retries);
        }
        if !step.critical {
            println!("      critical: false");
        }
        if step.skip {
            println!("      skip: true");
        }
    }
    println!();
    println!("order: {}", report.topological_order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
