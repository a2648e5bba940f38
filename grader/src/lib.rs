//! Weighted check classes built on the `harness` sandbox.
//!
//! - **[`suite`]**: parameterized check classes, check bodies, and class cleanups.
//! - **[`scoring`]**: per-instance `{weight, score}` records and the `weighted` wrapper.
//! - **[`checks`]**: ready-made reference comparison checks.
//! - **[`report`]**: the results document consumed by external graders.

pub mod checks;
pub mod cli;
pub mod report;
pub mod scoring;
pub mod suite;

pub use scoring::{Reporter, ScoreBook, ScoreRecord, weighted};
pub use suite::{
    CheckClass, CheckContext, CheckFn, CheckResult, CheckStatus, ClassReport, Params, check,
};
