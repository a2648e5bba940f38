//! Weighted scoring.
//!
//! [`weighted`] wraps a check so that, before its body runs, the instance has
//! a `{weight, score}` record, a [`Reporter`] to set its score, and a class
//! cleanup that publishes every record once the whole class has run.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::suite::{CheckContext, CheckFn, CheckResult, Params};

/// Weight used when no `Config` is found among the check's parameters.
pub const DEFAULT_WEIGHT: f64 = 0.0;

const PUBLISH_CLEANUP: &str = "publish_scores";

/// Declared weight and earned score of one check instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub weight: f64,
    /// `None` until the check reports a score.
    pub score: Option<f64>,
}

/// Score records of one class run, keyed by instance id.
#[derive(Debug, Clone, Default)]
pub struct ScoreBook(Arc<Mutex<BTreeMap<String, ScoreRecord>>>);

impl ScoreBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the record for `id` with an unset score.
    pub fn record(&self, id: &str, weight: f64) {
        self.entries()
            .insert(id.to_string(), ScoreRecord { weight, score: None });
    }

    pub fn set_score(&self, id: &str, score: f64) {
        if let Some(record) = self.entries().get_mut(id) {
            record.score = Some(score);
        }
    }

    pub fn get(&self, id: &str) -> Option<ScoreRecord> {
        self.entries().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, ScoreRecord> {
        self.entries().clone()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ScoreRecord>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lets a running check set its own score, any number of times.
#[derive(Debug, Clone)]
pub struct Reporter {
    id: String,
    book: ScoreBook,
}

impl Reporter {
    pub fn new(id: impl Into<String>, book: ScoreBook) -> Self {
        Self {
            id: id.into(),
            book,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn report(&self, score: f64) {
        debug!(check_id = %self.id, score, "score reported");
        self.book.set_score(&self.id, score);
    }
}

/// A check wrapped with weight tracking.
pub struct Weighted<C> {
    inner: C,
}

/// Wrap `inner` so its instance gets a score record and a reporter.
pub fn weighted<C: CheckFn>(inner: C) -> Weighted<C> {
    Weighted { inner }
}

impl<C: CheckFn> CheckFn for Weighted<C> {
    #[instrument(skip_all, fields(check_id = %ctx.id()))]
    fn run(&self, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
        let weight = params
            .config()
            .map_or(DEFAULT_WEIGHT, |config| config.weight);
        let book = ctx.scores().clone();
        book.record(ctx.id(), weight);
        debug!(weight, "score record created");

        ctx.install_reporter(Reporter::new(ctx.id(), book.clone()));
        ctx.add_class_cleanup(PUBLISH_CLEANUP, move |results| publish(&book, results));

        self.inner.run(ctx, params)
    }
}

/// Copy each instance's record onto its result.
fn publish(book: &ScoreBook, results: &mut [CheckResult]) {
    let mut published = 0;
    for result in results.iter_mut() {
        if let Some(record) = book.get(&result.id) {
            result.weight = Some(record.weight);
            result.score = record.score;
            published += 1;
        }
    }
    debug!(published, "score records published");
}
