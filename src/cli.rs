// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `rcubic`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rcubic",
    version,
    about = "Run release plans: dependency- and tier-ordered shell steps.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RCUBIC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Execute a plan.
    Run(RunArgs),
    /// Validate a plan document (check-in) without executing anything.
    Check(PlanArg),
    /// Print the plan's tiers, steps and execution order.
    Show(PlanArg),
}

#[derive(Debug, Clone, Args)]
pub struct PlanArg {
    /// Path to the plan document (TOML).
    #[arg(long, value_name = "PATH", default_value = "rcubic.toml")]
    pub plan: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArg,

    /// Override the plan's `max_concurrency`.
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Where per-step output logs are written.
    #[arg(long, value_name = "DIR", default_value = ".rcubic/output")]
    pub output_dir: PathBuf,

    /// Directory scripts run in (defaults to the plan's directory).
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Stream the run's event feed to this JSON-lines file.
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
