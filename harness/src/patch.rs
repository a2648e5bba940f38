//! Scoped, reversible symbol substitutions.
//!
//! A [`PatchStack`] applies patches in list order and reverts them in reverse
//! order when dropped, on every exit path. Later patches may shadow earlier
//! ones on the same path; reverse-order teardown restores each layer in turn.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::Interrupt;
use crate::runtime::{self, Callable, EXIT, OutputStream, QUIT, Symbol, exit_code};

/// Replace the symbol at `target` for the duration of one call.
#[derive(Clone)]
pub struct Patch {
    pub target: String,
    pub replacement: Symbol,
    /// Apply even when `target` is not bound yet (the binding is removed again on revert).
    pub allow_missing: bool,
}

impl Patch {
    pub fn new(target: impl Into<String>, replacement: Symbol) -> Self {
        Self {
            target: target.into(),
            replacement,
            allow_missing: false,
        }
    }

    pub fn function<F>(target: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        Self::new(target, Symbol::Function(Callable::new(f)))
    }

    pub fn value(target: impl Into<String>, value: Value) -> Self {
        Self::new(target, Symbol::Value(value))
    }

    pub fn stream(target: impl Into<String>, stream: Arc<dyn OutputStream>) -> Self {
        Self::new(target, Symbol::Stream(stream))
    }

    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

/// `exit()` and `quit()` raising [`Interrupt::Exit`] / [`Interrupt::Quit`]
/// instead of ending the process.
pub fn exit_quit_patches() -> [Patch; 2] {
    [
        Patch::function(EXIT, |args, _| Err(Interrupt::Exit(exit_code(&args)))),
        Patch::function(QUIT, |args, _| Err(Interrupt::Quit(exit_code(&args)))),
    ]
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("target", &self.target)
            .field("replacement", &self.replacement)
            .field("allow_missing", &self.allow_missing)
            .finish()
    }
}

/// Patches currently in effect, reverted in LIFO order on drop.
#[must_use = "patches are reverted as soon as the stack is dropped"]
pub struct PatchStack {
    applied: Vec<(String, Option<Symbol>)>,
}

impl PatchStack {
    /// Apply `patches` in order.
    ///
    /// A patch whose target is unbound and does not allow that fails with
    /// [`Interrupt::MissingSymbol`]; patches applied before it are reverted.
    pub fn apply(patches: &[Patch]) -> Result<Self, Interrupt> {
        let mut stack = Self {
            applied: Vec::with_capacity(patches.len()),
        };
        for patch in patches {
            if !patch.allow_missing && runtime::lookup(&patch.target).is_none() {
                debug!(target_path = %patch.target, "patch target missing");
                return Err(Interrupt::MissingSymbol(patch.target.clone()));
            }
            let previous = runtime::replace(&patch.target, Some(patch.replacement.clone()));
            trace!(target_path = %patch.target, "patch applied");
            stack.applied.push((patch.target.clone(), previous));
        }
        Ok(stack)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

impl Drop for PatchStack {
    fn drop(&mut self) {
        while let Some((target, previous)) = self.applied.pop() {
            runtime::replace(&target, previous);
            trace!(target_path = %target, "patch reverted");
        }
    }
}
