//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use harness::config::load_config;
use tracing::debug;

use crate::report::load_results;

/// Print totals and one line per check of a results file.
pub fn summarize(path: &Path) -> Result<()> {
    let results = load_results(path).context("load results")?;
    println!(
        "summary: score={} max_score={} passed={}/{}",
        results.score,
        results.max_score,
        results.passed(),
        results.tests.len()
    );
    for test in &results.tests {
        println!(
            "check: {:?} {}/{} {}",
            test.status, test.score, test.max_score, test.name
        );
    }
    Ok(())
}

/// Load and validate a check configuration file.
pub fn check_config(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("config not found at {}", path.display());
    }
    let config = load_config(path).context("load config")?;
    debug!(path = %path.display(), "config valid");
    println!(
        "config: obj_name={} sub_module={} ref_module={} weight={} entries={} time_limit={}s",
        config.obj_name,
        config.sub_module,
        config.ref_module,
        config.weight,
        config.entries.len(),
        config.time_limit
    );
    Ok(())
}
