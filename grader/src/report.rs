//! Results document for external consumers.
//!
//! A check with no published score counts as full weight when it passed and
//! as zero when it failed. Totals are the sums over every test.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::scoring::DEFAULT_WEIGHT;
use crate::suite::{CheckResult, CheckStatus, ClassReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Instance description shown to the student.
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub status: CheckStatus,
    pub output: String,
}

impl TestResult {
    fn from_check(class: &str, result: &CheckResult) -> Self {
        let max_score = result.weight.unwrap_or(DEFAULT_WEIGHT);
        let score = match (result.score, result.status) {
            (Some(score), _) => score,
            (None, CheckStatus::Passed) => max_score,
            (None, CheckStatus::Failed) => 0.0,
        };
        let name = if result.description.is_empty() {
            format!("{class}.{}", result.id)
        } else {
            result.description.clone()
        };
        Self {
            name,
            score,
            max_score,
            status: result.status,
            output: result.output.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub score: f64,
    pub max_score: f64,
    pub tests: Vec<TestResult>,
}

impl Results {
    pub fn from_reports(reports: &[ClassReport]) -> Self {
        let tests: Vec<TestResult> = reports
            .iter()
            .flat_map(|report| {
                report
                    .results
                    .iter()
                    .map(|result| TestResult::from_check(&report.name, result))
            })
            .collect();
        Self {
            score: tests.iter().map(|t| t.score).sum(),
            max_score: tests.iter().map(|t| t.max_score).sum(),
            tests,
        }
    }

    pub fn passed(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| t.status == CheckStatus::Passed)
            .count()
    }
}

#[instrument(skip(results), fields(tests = results.tests.len()))]
pub fn write_results(path: &Path, results: &Results) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create results dir {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(results).context("serialize results")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write results {}", path.display()))?;
    debug!(path = %path.display(), "results written");
    Ok(())
}

pub fn load_results(path: &Path) -> Result<Results> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
