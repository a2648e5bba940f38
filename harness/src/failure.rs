//! Classified failures and their user-visible message layout.
//!
//! Every failure renders as: an optional context paragraph (which call, which
//! import), the message, an optional `Hint:` block, and the transcript of the
//! run when it is non-empty. Checks built on this crate surface that text
//! unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Interrupt;
use crate::format::fill;

const LOOP_HINT: &str = "Make sure your program isn't stuck in an infinite loop.";
const RETURN_HINT: &str = "Try using a `return` statement instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// `input()` was called at the top level of a module being imported.
    ImportBlocked,
    ObjectNotFound,
    ModuleNotFound,
    Timeout,
    OutOfMemory,
    /// The scripted entries ran out mid-call.
    EndOfInput,
    /// The call returned without consuming every scripted entry.
    UnconsumedInput,
    ProcessExit,
    ProcessQuit,
    LogOverflow,
    IndexOutOfRange,
    Unclassified,
}

/// A classified failure with everything needed to explain it to a student.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    /// Which call or import went wrong, if known.
    pub context: Option<String>,
    pub message: String,
    pub hint: Option<String>,
    /// Formatted transcript (see `SimulatedUser::format_log`), possibly empty.
    pub transcript: String,
    /// Kind name of the underlying error for [`FailureKind::Unclassified`] and
    /// for failures raised while importing.
    pub origin: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            context: None,
            message: message.into(),
            hint: None,
            transcript: String::new(),
            origin: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Prepend a caller-supplied hint to the default one.
    pub fn with_extra_hint(mut self, extra: &str) -> Self {
        if extra.is_empty() {
            return self;
        }
        self.hint = Some(match self.hint.take() {
            Some(hint) => format!("{extra}  {hint}"),
            None => extra.to_string(),
        });
        self
    }

    pub fn is(&self, kind: FailureKind) -> bool {
        self.kind == kind
    }

    pub fn timeout(seconds: u64) -> Self {
        let unit = if seconds == 1 { "second" } else { "seconds" };
        Self::new(
            FailureKind::Timeout,
            "Your program ran for longer than expected.",
        )
        .with_hint(format!(
            "The time limit for this test is {seconds} {unit}.  {LOOP_HINT}"
        ))
    }

    pub fn out_of_memory(limit_gib: Option<f64>) -> Self {
        let message = match limit_gib {
            Some(gib) => format!(
                "Your program used more than the maximum allowed memory of {gib} GiB."
            ),
            None => "Your program ran out of memory.".to_string(),
        };
        Self::new(FailureKind::OutOfMemory, message)
    }

    pub fn end_of_input() -> Self {
        Self::new(
            FailureKind::EndOfInput,
            "Your program requested user input more times than expected.",
        )
        .with_hint(LOOP_HINT)
    }

    pub fn unconsumed_input() -> Self {
        Self::new(
            FailureKind::UnconsumedInput,
            "Your program ended before consuming all of the scripted input.",
        )
        .with_hint("Your program ended before the user finished entering input.")
    }

    pub fn log_overflow() -> Self {
        Self::new(
            FailureKind::LogOverflow,
            "Your program produced much more output than was expected.",
        )
        .with_hint(LOOP_HINT)
    }

    pub fn process_exit() -> Self {
        Self::new(
            FailureKind::ProcessExit,
            "Calling the `exit()` function is not allowed.",
        )
        .with_hint(RETURN_HINT)
    }

    pub fn process_quit() -> Self {
        Self::new(
            FailureKind::ProcessQuit,
            "Calling the `quit()` function is not allowed.",
        )
        .with_hint(RETURN_HINT)
    }

    pub fn import_blocked(obj_name: &str) -> Self {
        Self::new(
            FailureKind::ImportBlocked,
            format!("Stuck at call to `input()` while importing `{obj_name}`."),
        )
        .with_hint(
            "Avoid calling `input()` in the global scope \
             (i.e. outside of any function or other code block).",
        )
    }

    pub fn object_not_found(module: &str, obj_name: &str) -> Self {
        Self::new(
            FailureKind::ObjectNotFound,
            format!("Unable to import `{obj_name}`."),
        )
        .with_hint(format!(
            "Define `{obj_name}` in your `{module}` module, and make sure its \
             definition is not inside of any other block."
        ))
    }

    pub fn module_not_found(module: &str, obj_name: &str) -> Self {
        Self::new(
            FailureKind::ModuleNotFound,
            format!("Unable to import `{module}`."),
        )
        .with_hint(format!(
            "Make sure you have submitted a module named `{module}` and it \
             contains the definition of `{obj_name}`."
        ))
    }

    pub fn index_out_of_range(message: impl Into<String>) -> Self {
        Self::new(FailureKind::IndexOutOfRange, message)
    }

    /// Any other error from code under test, kept recognizable by its kind name.
    pub fn unclassified(kind: &str, message: &str) -> Self {
        Self::new(
            FailureKind::Unclassified,
            format!("The error was \"{kind}: {message}\"."),
        )
        .with_origin(kind)
    }

    /// Classify a signal raised during a guarded call.
    ///
    /// `time_limit` and `memory_limit_gib` are echoed back in the messages.
    pub fn from_interrupt(
        interrupt: &Interrupt,
        time_limit: u64,
        memory_limit_gib: Option<f64>,
    ) -> Self {
        match interrupt {
            Interrupt::TimedOut | Interrupt::Cancelled => Self::timeout(time_limit),
            Interrupt::OutOfMemory => Self::out_of_memory(memory_limit_gib),
            Interrupt::EndOfInput => Self::end_of_input(),
            Interrupt::LogOverflow { .. } => Self::log_overflow(),
            Interrupt::Exit(_) => Self::process_exit(),
            Interrupt::Quit(_) => Self::process_quit(),
            Interrupt::InputWhileImporting => Self::new(
                FailureKind::ImportBlocked,
                "Stuck at call to `input()` while importing.",
            ),
            Interrupt::MissingSymbol(path) => {
                Self::unclassified("MissingSymbol", &format!("`{path}` does not exist"))
            }
            Interrupt::Raised { kind, message } => Self::unclassified(kind, message),
        }
    }

    /// Render the full user-visible message.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(context) = &self.context {
            out.push('\n');
            out.push_str(&fill(context));
            out.push_str("\n\n");
        }
        out.push_str(&format_error_msg(&self.message, self.hint.as_deref()));
        out.push_str(&self.transcript);
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for Failure {}

/// Format a message and optional hint as filled paragraphs.
pub fn format_error_msg(message: &str, hint: Option<&str>) -> String {
    let mut out = fill(message);
    if let Some(hint) = hint.filter(|h| !h.is_empty()) {
        out.push_str("\n\nHint:\n");
        out.push_str(&fill(hint));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_with_and_without_hint() {
        assert_eq!(
            format_error_msg("This is an error message.", Some("This is a hint.")),
            "  This is an error message.\n\nHint:\n  This is a hint."
        );
        assert_eq!(
            format_error_msg("This is an error message.", None),
            "  This is an error message."
        );
    }

    #[test]
    fn extra_hint_is_prepended() {
        let failure = Failure::process_exit().with_extra_hint("this is a hint");
        assert_eq!(
            failure.render(),
            "  Calling the `exit()` function is not allowed.\n\nHint:\n  \
             this is a hint  Try using a `return` statement instead."
        );
    }

    #[test]
    fn interrupts_map_to_distinct_kinds() {
        let cases = [
            (Interrupt::TimedOut, FailureKind::Timeout),
            (Interrupt::OutOfMemory, FailureKind::OutOfMemory),
            (Interrupt::EndOfInput, FailureKind::EndOfInput),
            (Interrupt::LogOverflow { limit: 5 }, FailureKind::LogOverflow),
            (Interrupt::Exit(None), FailureKind::ProcessExit),
            (Interrupt::Quit(Some(2)), FailureKind::ProcessQuit),
            (
                Interrupt::raised("TypeError", "missing argument"),
                FailureKind::Unclassified,
            ),
        ];
        for (interrupt, kind) in cases {
            assert_eq!(Failure::from_interrupt(&interrupt, 1, Some(1.4)).kind, kind);
        }
    }

    #[test]
    fn limits_are_echoed_back() {
        let timeout = Failure::from_interrupt(&Interrupt::TimedOut, 1, None);
        assert!(timeout.render().contains("The time limit for this test is 1 second."));

        let timeout = Failure::from_interrupt(&Interrupt::TimedOut, 3, None);
        assert!(timeout.render().contains("3 seconds."));

        let oom = Failure::from_interrupt(&Interrupt::OutOfMemory, 1, Some(1.4));
        assert!(oom.render().contains("maximum allowed memory of 1.4 GiB"));
    }

    #[test]
    fn unclassified_keeps_origin_kind() {
        let failure =
            Failure::from_interrupt(&Interrupt::raised("ValueError", "bad literal"), 1, None);
        assert_eq!(failure.origin.as_deref(), Some("ValueError"));
        assert!(failure.render().contains("ValueError: bad literal"));
    }

    #[test]
    fn render_places_context_first_and_transcript_last() {
        let failure = Failure::end_of_input()
            .with_context("Your `main` malfunctioned when called as `main()`.")
            .with_transcript("\n\nline |Input/Output Log:\n");
        let rendered = failure.render();
        assert!(rendered.starts_with("\n  Your `main` malfunctioned"));
        assert!(rendered.contains("\n\n  Your program requested user input"));
        assert!(rendered.ends_with("Input/Output Log:\n"));
    }
}
