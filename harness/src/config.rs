//! Check configuration.
//!
//! One [`Config`] parameterizes one check invocation: which callable to run,
//! with which arguments and scripted entries, under which limits, and which
//! part of the transcript the check looks at. It is never mutated once built.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::limits::Limits;
use crate::patch::Patch;

/// Configuration for one check (TOML).
///
/// Missing fields take the defaults below; unknown fields are ignored so other
/// tooling can share the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Points the check is worth.
    pub weight: f64,

    /// Module holding the reference implementation.
    pub ref_module: String,
    /// Module holding the submission.
    pub sub_module: String,
    /// Name of the callable to run.
    pub obj_name: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,

    /// Scripted input entries, consumed one per `input()` call.
    pub entries: Vec<String>,

    /// Checkpoint the transcript queries are relative to (0 = whole transcript).
    pub interaction: usize,
    /// First line of the window (1-based).
    pub start: usize,
    /// Window length; `None` means through the end.
    pub n_lines: Option<usize>,
    pub line_n: usize,
    pub value_n: usize,

    /// Transcript character cap (0 = unlimited).
    pub log_limit: usize,
    /// Seconds before the call is abandoned.
    pub time_limit: u64,
    pub memory_limit_gib: Option<f64>,
    /// Frozen wall-clock reading seen through `runtime::now`.
    pub fixed_time: Option<DateTime<Utc>>,

    /// Extra hint appended to failure messages.
    pub hint: String,
    /// Emit the transcript as a tracing event after each call.
    pub debug: bool,

    /// Symbols whose calls are recorded by call-sequence checks.
    pub tracked_calls: Vec<String>,

    #[serde(skip)]
    pub patches: Vec<Patch>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weight: 0.0,
            ref_module: "reference".to_string(),
            sub_module: String::new(),
            obj_name: "main".to_string(),
            args: Vec::new(),
            kwargs: Map::new(),
            entries: Vec::new(),
            interaction: 0,
            start: 1,
            n_lines: None,
            line_n: 1,
            value_n: 1,
            log_limit: 0,
            time_limit: 1,
            memory_limit_gib: Some(1.4),
            fixed_time: None,
            hint: String::new(),
            debug: false,
            tracked_calls: Vec::new(),
            patches: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.obj_name.trim().is_empty() {
            return Err(anyhow!("obj_name must be non-empty"));
        }
        if self.time_limit == 0 {
            return Err(anyhow!("time_limit must be > 0"));
        }
        if let Some(gib) = self.memory_limit_gib
            && (!gib.is_finite() || gib <= 0.0)
        {
            return Err(anyhow!("memory_limit_gib must be > 0"));
        }
        if self.start == 0 {
            return Err(anyhow!("start must be >= 1"));
        }
        if self.line_n == 0 {
            return Err(anyhow!("line_n must be >= 1"));
        }
        if self.value_n == 0 {
            return Err(anyhow!("value_n must be >= 1"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(anyhow!("weight must be a non-negative number"));
        }
        Ok(())
    }

    /// Resource limits for guarded execution.
    pub fn limits(&self) -> Limits {
        Limits {
            time_limit: Duration::from_secs(self.time_limit),
            memory_limit_gib: self.memory_limit_gib,
        }
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }
}

/// Load a config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
