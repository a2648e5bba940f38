//! Signals raised from inside code under test.
//!
//! An [`Interrupt`] is how a target (or a primitive it called) reports that
//! something other than a normal return happened. The set is closed so every
//! catch site can branch on the variant instead of on message text.

use std::any::Any;
use std::collections::TryReserveError;

use thiserror::Error;

/// Kind name used for loader errors that mean "this module cannot be parsed".
pub const SYNTAX_ERROR: &str = "SyntaxError";

/// Kind name used for panics caught inside the worker thread.
pub const PANIC: &str = "panic";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Interrupt {
    /// `input()` was called while a module body was being imported.
    #[error("input() called while importing")]
    InputWhileImporting,
    /// The scripted entries ran out while the target asked for more input.
    #[error("no more scripted input entries")]
    EndOfInput,
    #[error("exit() called with code {0:?}")]
    Exit(Option<i32>),
    #[error("quit() called with code {0:?}")]
    Quit(Option<i32>),
    /// The interaction log grew past its character cap.
    #[error("interaction log exceeded {limit} characters")]
    LogOverflow { limit: usize },
    #[error("time limit exceeded")]
    TimedOut,
    #[error("memory ceiling exceeded")]
    OutOfMemory,
    /// The owning call was abandoned; raised by primitives on a stranded worker.
    #[error("call was cancelled")]
    Cancelled,
    #[error("symbol `{0}` does not exist")]
    MissingSymbol(String),
    /// Any other error, tagged with a free-form kind name (`TypeError`, `panic`, ...).
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },
}

impl Interrupt {
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A module body that cannot be loaded at all.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::raised(SYNTAX_ERROR, message)
    }

    /// Kind name reported as the origin of a wrapped failure.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::InputWhileImporting => "InputWhileImporting",
            Self::EndOfInput => "EndOfInput",
            Self::Exit(_) => "Exit",
            Self::Quit(_) => "Quit",
            Self::LogOverflow { .. } => "LogOverflow",
            Self::TimedOut => "TimedOut",
            Self::OutOfMemory => "OutOfMemory",
            Self::Cancelled => "Cancelled",
            Self::MissingSymbol(_) => "MissingSymbol",
            Self::Raised { kind, .. } => kind,
        }
    }

    /// Convert a caught panic payload.
    ///
    /// Allocation failures that unwind (capacity overflow) are reported as
    /// [`Interrupt::OutOfMemory`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        if message.contains("capacity overflow") || message.contains("memory allocation") {
            return Self::OutOfMemory;
        }
        Self::raised(PANIC, message)
    }
}

impl From<TryReserveError> for Interrupt {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
