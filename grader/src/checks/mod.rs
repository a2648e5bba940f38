//! Ready-made checks comparing a submission against the reference.
//!
//! Each check module exposes a `build` function that expands one weighted
//! instance per `Config` and a `describe` function for the instance text.

pub mod calls;
pub mod defined;
pub mod output_lines;
pub mod output_value;
pub mod output_values;

use anyhow::{Context, Result, anyhow};
use harness::failure::format_error_msg;
use harness::format::{entries_list, make_call_str};
use harness::{Config, ModuleRegistry, SimulatedUser};
use tracing::debug;

use crate::suite::Params;

/// The `Config` every ready-made check is parameterized with.
pub(crate) fn required_config(params: &Params) -> Result<&Config> {
    params
        .config()
        .context("check parameters do not include a Config")
}

/// Run the reference, then the submission, with the same configuration.
pub(crate) fn run_reference_then_submission(
    registry: &ModuleRegistry,
    config: &Config,
) -> Result<(SimulatedUser, SimulatedUser)> {
    let mut reference = SimulatedUser::reference(registry, config)?;
    reference
        .call_configured()
        .with_context(|| format!("reference module `{}` failed", config.ref_module))?;
    debug!(module = %config.ref_module, "reference run complete");

    let mut submission = SimulatedUser::submission(registry, config)?;
    submission.call_configured()?;
    debug!(module = %config.sub_module, "submission run complete");
    Ok((reference, submission))
}

/// `` `main("x")` `` followed by ` with entries=[..]` when entries are scripted.
pub(crate) fn call_phrase(config: &Config) -> String {
    let call_str = make_call_str(&config.obj_name, &config.args, &config.kwargs);
    if config.entries.is_empty() {
        format!("`{call_str}`")
    } else {
        format!("`{call_str}` with entries={}", entries_list(&config.entries))
    }
}

/// Append the configured hint to a default hint.
pub(crate) fn with_config_hint(hint: String, config: &Config) -> String {
    if config.hint.is_empty() {
        hint
    } else {
        format!("{hint}  {}", config.hint)
    }
}

/// A mismatch between reference and submission: summary, hint, transcript.
pub(crate) fn mismatch(summary: &str, hint: &str, submission: &SimulatedUser) -> anyhow::Error {
    anyhow!(
        "{}{}",
        format_error_msg(summary, Some(hint)),
        submission.format_log()
    )
}
