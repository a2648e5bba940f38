//! Sandboxed execution of code under test for automated grading.
//!
//! Code under test is registered as Rust callables in a [`importer::ModuleRegistry`]
//! and talks to the outside world only through [`runtime`] primitives. The
//! primitives resolve process-global symbols, which lets a [`user::SimulatedUser`]
//! substitute scripted input, capture output into an [`log::InteractionLog`], and
//! turn `exit()`/`quit()` into classified failures for the duration of one call.
//!
//! - **[`runtime`]**: the symbol table, primitives, and scoped [`patch`] stacks.
//! - **[`limits`]**: time limit, memory ceiling, and the call lock.
//! - **[`failure`]**: the failure taxonomy and user-facing message layout.
//! - **[`format`]**: call strings, ordinals, and paragraph filling.

pub mod config;
pub mod error;
pub mod failure;
pub mod format;
pub mod importer;
pub mod limits;
pub mod log;
pub mod logging;
pub mod patch;
pub mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod user;

pub use config::Config;
pub use error::Interrupt;
pub use failure::{Failure, FailureKind};
pub use importer::{Module, ModuleRegistry, Object};
pub use patch::Patch;
pub use runtime::{Callable, Symbol};
pub use user::SimulatedUser;
