//! Diagnostic tracing for grading runs.
//!
//! Tracing output goes to stderr and never into the transcript of code under
//! test: the interaction log (`log`) is always recorded in full, regardless of
//! `RUST_LOG`.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const QUIET_DIRECTIVE: &str = "warn";
const VERBOSE_DIRECTIVE: &str = "warn,harness=debug,grader=debug";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or debug events
/// from the grading crates when `verbose` is true.
///
/// # Example
/// ```bash
/// RUST_LOG=harness::user=debug grader summarize results.json
/// ```
pub fn init(verbose: bool) -> Result<()> {
    let fallback = if verbose {
        VERBOSE_DIRECTIVE
    } else {
        QUIET_DIRECTIVE
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}
