//! Weighted scoring across whole check classes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use grader::suite::Param;
use grader::{CheckClass, CheckStatus, Params, check, weighted};
use harness::Config;
use serde_json::json;

fn weight(weight: f64) -> Config {
    Config {
        weight,
        ..Config::default()
    }
}

#[test]
fn finalize_runs_once_and_publishes_every_instance() {
    let finalized = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finalized);

    let class = CheckClass::new("Mixed").expand(
        "check_mixed",
        vec![
            Params::from_config(weight(1.0)).arg(json!("pass")),
            Params::from_config(weight(2.0)).arg(json!("fail")),
            Params::from_config(weight(3.0)).arg(json!("panic")),
        ],
        |params| format!("weight {}", params.config().map_or(0.0, |c| c.weight)),
        weighted(check(move |ctx, params| {
            let counter = Arc::clone(&counter);
            ctx.add_class_cleanup("count_finalize", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            match &params.args[1] {
                Param::Value(mode) if mode == "fail" => bail!("no credit"),
                Param::Value(mode) if mode == "panic" => panic!("check crashed"),
                _ => {
                    ctx.report(params.config().map_or(0.0, |c| c.weight));
                    Ok(())
                }
            }
        })),
    );

    let report = class.run();
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
    assert_eq!(report.results.len(), 3);

    let published: Vec<(Option<f64>, Option<f64>)> = report
        .results
        .iter()
        .map(|r| (r.weight, r.score))
        .collect();
    assert_eq!(
        published,
        vec![(Some(1.0), Some(1.0)), (Some(2.0), None), (Some(3.0), None)]
    );
    assert_eq!(report.results[0].description, "weight 1");
    assert_eq!(report.results[1].status, CheckStatus::Failed);
    assert_eq!(report.results[2].status, CheckStatus::Failed);
}

#[test]
fn weight_comes_from_keyword_config_or_defaults_to_zero() {
    let class = CheckClass::new("Weights").expand(
        "check_weights",
        vec![
            Params::new().arg(json!(1)).kwarg("options", weight(4.0)),
            Params::new().arg(json!(2)),
        ],
        |_| String::new(),
        weighted(check(|_, _| Ok(()))),
    );
    let report = class.run();
    assert_eq!(report.results[0].weight, Some(4.0));
    assert_eq!(report.results[1].weight, Some(0.0));
    assert!(report.results.iter().all(|r| r.score.is_none()));
}

#[test]
fn later_reports_overwrite_earlier_ones() {
    let class = CheckClass::new("Stages").expand(
        "check_stages",
        vec![Params::from_config(weight(5.0)), Params::from_config(weight(5.0))],
        |_| String::new(),
        weighted(check(|ctx, _| {
            ctx.report(0.0);
            if ctx.id().ends_with("_1") {
                bail!("second stage failed");
            }
            ctx.report(5.0);
            Ok(())
        })),
    );
    let report = class.run();
    assert_eq!(report.results[0].score, Some(5.0));
    assert_eq!(report.results[1].score, Some(0.0));
}

#[test]
fn unweighted_checks_publish_nothing() {
    let class = CheckClass::new("Plain").expand(
        "check_plain",
        vec![Params::from_config(weight(2.0))],
        |_| String::new(),
        check(|ctx, _| {
            ctx.report(2.0);
            Ok(())
        }),
    );
    let report = class.run();
    assert_eq!(report.results[0].weight, None);
    assert_eq!(report.results[0].score, None);
}

#[test]
fn each_run_starts_with_fresh_records() {
    let class = CheckClass::new("Repeat").expand(
        "check_repeat",
        vec![Params::from_config(weight(1.0))],
        |_| String::new(),
        weighted(check(|ctx, _| {
            ctx.report(1.0);
            Ok(())
        })),
    );
    let first = class.run();
    let second = class.run();
    assert_eq!(first, second);
}
