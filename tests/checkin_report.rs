// tests/checkin_report.rs

mod common;
use crate::common::builders::{step, PlanBuilder, StepBuilder};

use std::error::Error;
use std::fs;

use rcubic::checkin::{check_plan, check_plan_file};
use rcubic::errors::{PlanError, RcubicError};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn report_summarises_a_valid_plan() -> TestResult {
    let plan = PlanBuilder::new()
        .name("release")
        .tiers(&["staging", "production"])
        .with_step(StepBuilder::new("migrate").tier("staging").build())
        .with_step(StepBuilder::new("deploy").tier("production").build())
        .with_step(StepBuilder::new("verify").tier("production").after("deploy").build())
        .build();

    let report = check_plan(&plan)?;
    assert_eq!(report.plan, "release");
    assert_eq!(report.step_count, 3);
    assert_eq!(
        report.tiers,
        vec![
            ("staging".to_string(), vec!["migrate".to_string()]),
            (
                "production".to_string(),
                vec!["deploy".to_string(), "verify".to_string()]
            ),
        ]
    );
    assert_eq!(report.roots, vec!["migrate".to_string()]);
    assert_eq!(report.topological_order, vec!["migrate", "deploy", "verify"]);

    let text = report.to_string();
    assert!(text.contains("plan 'release' ok: 3 step(s)"));
    assert!(text.contains("order: migrate -> deploy -> verify"));
    Ok(())
}

#[test]
fn check_rejects_cycles() {
    let plan = PlanBuilder::new()
        .with_step(step("A", &["B"]))
        .with_step(step("B", &["A"]))
        .build();

    assert_eq!(
        check_plan(&plan).unwrap_err(),
        PlanError::CyclicDependency {
            steps: vec!["A".to_string(), "B".to_string()],
        }
    );
}

#[test]
fn check_file_reports_unknown_dependencies() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("plan.toml");
    fs::write(
        &path,
        r#"
[[step]]
name = "deploy"
script = "deploy.sh"
after = ["build"]
"#,
    )?;

    match check_plan_file(&path) {
        Err(RcubicError::Plan(PlanError::UnknownDependency { step, missing })) => {
            assert_eq!(step, "deploy");
            assert_eq!(missing, "build");
        }
        other => panic!("expected unknown dependency, got {other:?}"),
    }
    Ok(())
}
