//! Ready-made checks against small reference and submission modules.

use grader::checks::{calls, defined, output_lines, output_value, output_values};
use grader::report::{Results, load_results, write_results};
use grader::{CheckStatus, ClassReport};
use harness::runtime;
use harness::test_support::{config, registry, serial};
use harness::{Config, Interrupt, Module, ModuleRegistry};
use serde_json::{Map, Value, json};

fn sum_line(offset: f64, _: Vec<Value>, _: Map<String, Value>) -> Result<Value, Interrupt> {
    let a: f64 = runtime::input("First number: ")?.parse().unwrap_or_default();
    let b: f64 = runtime::input("Second number: ")?.parse().unwrap_or_default();
    runtime::print(&format!("The sum of {a} and {b} is {}.", a + b + offset))?;
    Ok(Value::Null)
}

fn grading_registry() -> ModuleRegistry {
    let mut registry = registry();
    registry
        .register_module(
            "sum_ref",
            Module::new().function("main", |args, kwargs| sum_line(0.0, args, kwargs)),
        )
        .register_module(
            "sum_off_by_one",
            Module::new().function("main", |args, kwargs| sum_line(1.0, args, kwargs)),
        )
        .register_module(
            "rude",
            Module::new().function("main", |_, _| {
                let name = runtime::input("What is your name? ")?;
                runtime::print(&format!("Go away, {name}."))?;
                Ok(Value::Null)
            }),
        )
        .register_module("constant", Module::new().value("main", json!(42)))
        .register_module(
            "shout_ref",
            Module::new()
                .function("shout", |args, _| Ok(args.first().cloned().unwrap_or(Value::Null)))
                .function("main", |_, _| {
                    runtime::call("shout_ref.shout", vec![json!("hi")])?;
                    runtime::call("shout_ref.shout", vec![json!("bye")])?;
                    Ok(Value::Null)
                }),
        )
        .register_module(
            "shout_once",
            Module::new()
                .function("shout", |args, _| Ok(args.first().cloned().unwrap_or(Value::Null)))
                .function("main", |_, _| {
                    runtime::call("shout_once.shout", vec![json!("hi")])?;
                    Ok(Value::Null)
                }),
        );
    registry
}

fn cfg(ref_module: &str, sub_module: &str, weight: f64) -> Config {
    Config {
        ref_module: ref_module.to_string(),
        sub_module: sub_module.to_string(),
        weight,
        ..config()
    }
}

fn statuses(report: &ClassReport) -> Vec<CheckStatus> {
    report.results.iter().map(|r| r.status).collect()
}

#[test]
fn callable_is_defined_distinguishes_failures() {
    let _guard = serial();
    let report = defined::build(
        grading_registry(),
        vec![
            cfg("reference", "hello", 1.0),
            cfg("reference", "absent", 1.0),
            cfg("reference", "constant", 1.0),
            cfg("reference", "asks_at_import", 1.0),
        ],
    )
    .run();

    assert_eq!(
        statuses(&report),
        vec![
            CheckStatus::Passed,
            CheckStatus::Failed,
            CheckStatus::Failed,
            CheckStatus::Failed
        ]
    );
    assert_eq!(report.results[0].score, Some(1.0));
    assert_eq!(
        report.results[0].description,
        "Check that callable `main` is defined in module `hello`."
    );
    assert!(report.results[1].output.contains("Unable to import `absent`."));
    assert!(report.results[2].output.contains("The object `main` is not a function."));
    assert!(report.results[3].output.contains("Stuck at call to `input()`"));
}

#[test]
fn output_lines_compare_the_configured_window() {
    let _guard = serial();
    let entries = vec!["AJ".to_string()];
    let matching = Config {
        entries: entries.clone(),
        ..cfg("reference", "greeter", 2.0)
    };
    let prompt_only = Config {
        entries: entries.clone(),
        n_lines: Some(1),
        ..cfg("reference", "rude", 2.0)
    };
    let different = Config {
        entries,
        ..cfg("reference", "rude", 2.0)
    };

    let report =
        output_lines::build(grading_registry(), vec![matching, prompt_only, different]).run();
    assert_eq!(
        statuses(&report),
        vec![CheckStatus::Passed, CheckStatus::Passed, CheckStatus::Failed]
    );
    assert_eq!(report.results[2].score, Some(0.0));
    assert!(report.results[2].output.contains("Your output did not match"));
    assert!(report.results[2].output.contains("Go away, AJ."));
}

#[test]
fn output_values_report_zero_then_full_credit() {
    let _guard = serial();
    let base = Config {
        entries: vec!["3".to_string(), "4.5".to_string()],
        line_n: 3,
        ..cfg("sum_ref", "sum_ref", 1.5)
    };
    let buggy = Config {
        sub_module: "sum_off_by_one".to_string(),
        ..base.clone()
    };

    let report = output_values::build(grading_registry(), vec![base, buggy]).run();
    assert_eq!(report.results[0].score, Some(1.5));
    assert_eq!(report.results[1].score, Some(0.0));
    assert!(report.results[1].output.contains("[3.0, 4.5, 7.5]"));
}

#[test]
fn output_value_compares_one_value() {
    let _guard = serial();
    let entries = vec!["3".to_string(), "4.5".to_string()];
    let first_value = Config {
        entries: entries.clone(),
        line_n: 3,
        value_n: 1,
        ..cfg("sum_ref", "sum_off_by_one", 1.0)
    };
    let third_value = Config {
        entries,
        line_n: 3,
        value_n: 3,
        ..cfg("sum_ref", "sum_off_by_one", 1.0)
    };

    let report = output_value::build(grading_registry(), vec![first_value, third_value]).run();
    assert_eq!(statuses(&report), vec![CheckStatus::Passed, CheckStatus::Failed]);
    assert!(report.results[1].output.contains("Expected 7.5, but found 8.5."));
    assert!(report.results[1].description.starts_with("Check that the 3rd value on output line 3"));
}

#[test]
fn function_calls_compare_recorded_sequences() {
    let _guard = serial();
    let tracked = vec!["shout".to_string()];
    let same = Config {
        tracked_calls: tracked.clone(),
        ..cfg("shout_ref", "shout_ref", 1.0)
    };
    let fewer = Config {
        tracked_calls: tracked,
        ..cfg("shout_ref", "shout_once", 1.0)
    };

    let report = calls::build(grading_registry(), vec![same, fewer]).run();
    assert_eq!(statuses(&report), vec![CheckStatus::Passed, CheckStatus::Failed]);
    assert!(report.results[1].output.contains("shout(\"bye\")"));
}

#[test]
fn submission_failures_keep_their_message() {
    let _guard = serial();
    let report = output_lines::build(
        grading_registry(),
        vec![Config {
            entries: vec!["AJ".to_string()],
            ..cfg("reference", "spinner", 1.0)
        }],
    )
    .run();
    let output = &report.results[0].output;
    assert!(output.contains("Your program ran for longer than expected."));
    assert!(output.contains("Your `main` malfunctioned"));
    assert_eq!(report.results[0].score, Some(0.0));
}

#[test]
fn helper_failures_leave_a_zero_score() {
    let _guard = serial();
    let missing_line = Config {
        entries: vec!["3".to_string(), "4.5".to_string()],
        line_n: 9,
        ..cfg("sum_ref", "sum_ref", 2.0)
    };
    let report = output_values::build(grading_registry(), vec![missing_line]).run();
    assert_eq!(statuses(&report), vec![CheckStatus::Failed]);
    assert!(report.results[0].output.contains("Looking for line 9"));
    assert_eq!(report.results[0].score, Some(0.0));

    let report = defined::build(grading_registry(), vec![cfg("reference", "absent", 2.0)]).run();
    assert_eq!(report.results[0].score, Some(0.0));

    let report = calls::build(
        grading_registry(),
        vec![Config {
            tracked_calls: vec!["shout".to_string()],
            ..cfg("shout_ref", "exits_at_import", 2.0)
        }],
    )
    .run();
    assert_eq!(report.results[0].weight, Some(2.0));
    assert_eq!(report.results[0].score, Some(0.0));
}

#[test]
fn reports_become_a_results_file() {
    let _guard = serial();
    let reports = vec![
        defined::build(grading_registry(), vec![cfg("reference", "hello", 1.0)]).run(),
        output_lines::build(
            grading_registry(),
            vec![Config {
                entries: vec!["AJ".to_string()],
                ..cfg("reference", "rude", 3.0)
            }],
        )
        .run(),
    ];
    let results = Results::from_reports(&reports);
    assert_eq!(results.score, 1.0);
    assert_eq!(results.max_score, 4.0);

    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("results.json");
    write_results(&path, &results).expect("write");
    assert_eq!(load_results(&path).expect("load"), results);
}
