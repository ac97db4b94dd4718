// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;
use rcubic::cli::{CliArgs, Command, LogLevel};
use rcubic::logging::parse_level_str;

#[test]
fn run_defaults() {
    let args = CliArgs::try_parse_from(["rcubic", "run"]).unwrap();
    assert!(args.log_level.is_none());
    match args.command {
        Command::Run(run) => {
            assert_eq!(run.plan.plan, PathBuf::from("rcubic.toml"));
            assert_eq!(run.output_dir, PathBuf::from(".rcubic/output"));
            assert!(run.max_concurrency.is_none());
            assert!(run.events.is_none());
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn run_overrides_and_global_log_level() {
    let args = CliArgs::try_parse_from([
        "rcubic",
        "run",
        "--plan",
        "plans/release.toml",
        "--max-concurrency",
        "3",
        "--events",
        "events.jsonl",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    match args.command {
        Command::Run(run) => {
            assert_eq!(run.plan.plan, PathBuf::from("plans/release.toml"));
            assert_eq!(run.max_concurrency, Some(3));
            assert_eq!(run.events, Some(PathBuf::from("events.jsonl")));
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn check_takes_a_plan_path() {
    let args = CliArgs::try_parse_from(["rcubic", "check", "--plan", "x.toml"]).unwrap();
    match args.command {
        Command::Check(p) => assert_eq!(p.plan, PathBuf::from("x.toml")),
        other => panic!("expected check, got {other:?}"),
    }
}

#[test]
fn subcommand_is_required() {
    assert!(CliArgs::try_parse_from(["rcubic"]).is_err());
}

#[test]
fn env_log_levels_parse_case_insensitively() {
    assert_eq!(parse_level_str("DEBUG"), Some(tracing::Level::DEBUG));
    assert_eq!(parse_level_str(" warning "), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("loud"), None);
}
