//! Check classes: parameterized expansion, execution, and class cleanups.
//!
//! A [`CheckClass`] owns a list of generated instances. Each instance pairs a
//! shared check body with one parameter set and gets its own identity
//! (`<method>_<index>`). Running the class runs every instance in order and
//! then each registered class cleanup exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use harness::{Config, Failure, Interrupt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::scoring::{Reporter, ScoreBook};

/// One check parameter.
#[derive(Debug, Clone)]
pub enum Param {
    Config(Box<Config>),
    Value(Value),
}

impl From<Config> for Param {
    fn from(config: Config) -> Self {
        Self::Config(Box::new(config))
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Positional and keyword parameters of one generated instance.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub args: Vec<Param>,
    pub kwargs: BTreeMap<String, Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters holding a single positional `Config`.
    pub fn from_config(config: Config) -> Self {
        Self::new().arg(config)
    }

    pub fn arg(mut self, param: impl Into<Param>) -> Self {
        self.args.push(param.into());
        self
    }

    pub fn kwarg(mut self, name: &str, param: impl Into<Param>) -> Self {
        self.kwargs.insert(name.to_string(), param.into());
        self
    }

    /// The first `Config`, searching positional parameters before keyword ones.
    pub fn config(&self) -> Option<&Config> {
        self.args
            .iter()
            .chain(self.kwargs.values())
            .find_map(|param| match param {
                Param::Config(config) => Some(config.as_ref()),
                Param::Value(_) => None,
            })
    }
}

/// Runs at most once per class run, after every instance.
pub type ClassCleanup = Box<dyn FnOnce(&mut [CheckResult]) + Send>;

/// What a check body sees while it runs.
pub struct CheckContext<'a> {
    id: &'a str,
    class_name: &'a str,
    scores: &'a ScoreBook,
    cleanups: &'a mut Vec<(String, ClassCleanup)>,
    reporter: Option<Reporter>,
}

impl<'a> CheckContext<'a> {
    /// Instance identity, distinct per parameter set.
    pub fn id(&self) -> &'a str {
        self.id
    }

    pub fn class_name(&self) -> &'a str {
        self.class_name
    }

    pub fn scores(&self) -> &'a ScoreBook {
        self.scores
    }

    pub fn install_reporter(&mut self, reporter: Reporter) {
        self.reporter = Some(reporter);
    }

    pub fn reporter(&self) -> Option<&Reporter> {
        self.reporter.as_ref()
    }

    /// Set this instance's score. Only weighted checks have a record to update.
    pub fn report(&self, score: f64) {
        match &self.reporter {
            Some(reporter) => reporter.report(score),
            None => warn!(check_id = %self.id, score, "score reported by an unweighted check"),
        }
    }

    /// Register `cleanup` under `key` unless a cleanup with that key exists.
    ///
    /// Returns whether the cleanup was added.
    pub fn add_class_cleanup<F>(&mut self, key: &str, cleanup: F) -> bool
    where
        F: FnOnce(&mut [CheckResult]) + Send + 'static,
    {
        if self.cleanups.iter().any(|(existing, _)| existing == key) {
            return false;
        }
        debug!(class = %self.class_name, key, "class cleanup registered");
        self.cleanups.push((key.to_string(), Box::new(cleanup)));
        true
    }
}

/// A check body shared by every instance generated from it.
pub trait CheckFn: Send + Sync {
    fn run(&self, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()>;
}

/// Adapter from a closure to [`CheckFn`].
pub struct FnCheck<F>(F);

/// Use a closure as a check body.
pub fn check<F>(f: F) -> FnCheck<F>
where
    F: Fn(&mut CheckContext<'_>, &Params) -> Result<()> + Send + Sync,
{
    FnCheck(f)
}

impl<F> CheckFn for FnCheck<F>
where
    F: Fn(&mut CheckContext<'_>, &Params) -> Result<()> + Send + Sync,
{
    fn run(&self, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
        (self.0)(ctx, params)
    }
}

/// One generated check.
#[derive(Clone)]
pub struct CheckInstance {
    /// Name of the check method this instance was expanded from.
    pub method: String,
    pub id: String,
    pub description: String,
    pub params: Params,
    body: Arc<dyn CheckFn>,
}

impl fmt::Debug for CheckInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckInstance")
            .field("method", &self.method)
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
}

/// Outcome of one instance, plus its published score record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub description: String,
    pub status: CheckStatus,
    /// Failure text shown to the student; empty on success.
    pub output: String,
    /// Set by the score publishing cleanup of weighted checks.
    pub weight: Option<f64>,
    pub score: Option<f64>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

/// Results of one class run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub name: String,
    pub results: Vec<CheckResult>,
}

#[derive(Debug, Clone)]
pub struct CheckClass {
    name: String,
    instances: Vec<CheckInstance>,
}

impl CheckClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instances(&self) -> &[CheckInstance] {
        &self.instances
    }

    /// Generate one instance of `body` per parameter set.
    ///
    /// Instance ids are `<method>_<index>`; descriptions come from `describe`.
    /// Expanding a method again continues its index.
    pub fn expand<C, D>(mut self, method: &str, params: Vec<Params>, describe: D, body: C) -> Self
    where
        C: CheckFn + 'static,
        D: Fn(&Params) -> String,
    {
        let body: Arc<dyn CheckFn> = Arc::new(body);
        let first = self.instances.iter().filter(|i| i.method == method).count();
        for (index, params) in (first..).zip(params) {
            self.instances.push(CheckInstance {
                method: method.to_string(),
                id: format!("{method}_{index}"),
                description: describe(&params),
                params,
                body: Arc::clone(&body),
            });
        }
        self
    }

    /// Run every instance in order, then every class cleanup once.
    #[instrument(skip_all, fields(class = %self.name, instances = self.instances.len()))]
    pub fn run(&self) -> ClassReport {
        let scores = ScoreBook::new();
        let mut cleanups: Vec<(String, ClassCleanup)> = Vec::new();
        let mut results = Vec::with_capacity(self.instances.len());

        for instance in &self.instances {
            let mut ctx = CheckContext {
                id: &instance.id,
                class_name: &self.name,
                scores: &scores,
                cleanups: &mut cleanups,
                reporter: None,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                instance.body.run(&mut ctx, &instance.params)
            }));
            let (status, output) = match outcome {
                Ok(Ok(())) => (CheckStatus::Passed, String::new()),
                Ok(Err(err)) => (CheckStatus::Failed, render_error(&err)),
                Err(payload) => (
                    CheckStatus::Failed,
                    Interrupt::from_panic(payload).to_string(),
                ),
            };
            debug!(check_id = %instance.id, ?status, "check finished");
            results.push(CheckResult {
                id: instance.id.clone(),
                description: instance.description.clone(),
                status,
                output,
                weight: None,
                score: None,
            });
        }

        for (key, cleanup) in cleanups {
            debug!(key, "running class cleanup");
            cleanup(&mut results);
        }

        let passed = results.iter().filter(|r| r.passed()).count();
        info!(passed, total = results.len(), "check class finished");
        ClassReport {
            name: self.name.clone(),
            results,
        }
    }
}

/// Student-facing text for a failed check.
fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Failure>() {
        Some(failure) => failure.render(),
        None => format!("{err:#}"),
    }
}
