//! A simulated user driving one target callable.
//!
//! The user feeds scripted entries to every `input()` call, captures printed
//! output into an [`InteractionLog`], and records a checkpoint just before
//! each prompt so queries can address "the output after the k-th prompt".

use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::Interrupt;
use crate::failure::Failure;
use crate::format::{display, entries_list, make_call_str, ordinalize};
use crate::importer::{ModuleRegistry, Object};
use crate::limits::run_guarded;
use crate::log::{InteractionLog, LogStream, SharedLog};
use crate::patch::{Patch, exit_quit_patches};
use crate::runtime::{self, INPUT, NOW, STDOUT, lock};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?[0-9]{1,3}(?:(?:,[0-9]{3})+|(?:[0-9]*))(?:\.[0-9]*)?(?:e[+-][0-9]+)?")
        .expect("numeric pattern is valid")
});

const LOG_RULE_WIDTH: usize = 70;

pub struct SimulatedUser {
    module: String,
    target: Object,
    config: Config,
    log: SharedLog,
    checkpoints: Arc<Mutex<Vec<usize>>>,
    entries: Arc<Mutex<VecDeque<String>>>,
    patches: Vec<Patch>,
    returned: Option<Value>,
}

impl SimulatedUser {
    /// Import `config.obj_name` from `module` and prepare the patch set.
    #[instrument(skip(registry, config), fields(obj_name = %config.obj_name))]
    pub fn new(registry: &ModuleRegistry, module: &str, config: &Config) -> Result<Self, Failure> {
        let target = registry.import(module, &config.obj_name, &config.limits())?;
        let log: SharedLog = Arc::new(Mutex::new(InteractionLog::new(config.log_limit)));
        let checkpoints = Arc::new(Mutex::new(vec![0]));
        let entries = Arc::new(Mutex::new(VecDeque::new()));

        let mut patches = Vec::with_capacity(config.patches.len() + 5);
        if let Some(frozen) = config.fixed_time {
            let text = runtime::timestamp(frozen);
            patches.push(Patch::function(NOW, move |_, _| Ok(Value::String(text.clone()))));
        }
        patches.push(Patch::stream(STDOUT, Arc::new(LogStream(Arc::clone(&log)))));
        patches.push(responder(&log, &checkpoints, &entries));
        patches.extend(exit_quit_patches());
        patches.extend(config.patches.iter().cloned());

        debug!(module, patches = patches.len(), "simulated user ready");
        Ok(Self {
            module: module.to_string(),
            target,
            config: config.clone(),
            log,
            checkpoints,
            entries,
            patches,
            returned: None,
        })
    }

    /// A user of the reference implementation (`config.ref_module`).
    pub fn reference(registry: &ModuleRegistry, config: &Config) -> Result<Self, Failure> {
        Self::new(registry, &config.ref_module, config)
    }

    /// A user of the submission (`config.sub_module`).
    pub fn submission(registry: &ModuleRegistry, config: &Config) -> Result<Self, Failure> {
        Self::new(registry, &config.sub_module, config)
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Call the target with the configured arguments.
    pub fn call_configured(&mut self) -> Result<Value, Failure> {
        let args = self.config.args.clone();
        let kwargs = self.config.kwargs.clone();
        self.call(&args, &kwargs)
    }

    /// Call the target with copies of `args` and `kwargs`.
    ///
    /// The configured entries are loaded fresh for each call. A call that
    /// returns while entries remain fails with `UnconsumedInput`.
    #[instrument(skip_all, fields(obj_name = %self.config.obj_name))]
    pub fn call(&mut self, args: &[Value], kwargs: &Map<String, Value>) -> Result<Value, Failure> {
        *lock(&self.entries) = self.config.entries.iter().cloned().collect();
        if self.config.log_limit > 0 {
            lock(&self.log).set_limit(self.config.log_limit);
        }

        let preamble = self.preamble(args, kwargs);
        let target = match &self.target {
            Object::Function(callable) => callable.clone(),
            Object::Value(_) => {
                let name = &self.config.obj_name;
                return Err(self.fail(
                    Failure::unclassified("TypeError", &format!("`{name}` is not callable")),
                    preamble,
                ));
            }
        };

        let args = args.to_vec();
        let kwargs = kwargs.clone();
        let outcome = run_guarded(&self.config.limits(), &self.patches, move || {
            target.call(args, kwargs)
        });

        if self.config.debug {
            info!(transcript = %self.log_contents(), "call transcript");
        }

        match outcome {
            Ok(value) => {
                let remaining = lock(&self.entries).len();
                if remaining > 0 {
                    debug!(remaining, "call returned with unconsumed entries");
                    return Err(self.fail(Failure::unconsumed_input(), preamble));
                }
                self.returned = Some(value.clone());
                Ok(value)
            }
            Err(interrupt) => {
                debug!(err = %interrupt, "call interrupted");
                let failure = Failure::from_interrupt(
                    &interrupt,
                    self.config.time_limit,
                    self.config.memory_limit_gib,
                );
                Err(self.fail(failure, preamble))
            }
        }
    }

    fn preamble(&self, args: &[Value], kwargs: &Map<String, Value>) -> String {
        let call_str = make_call_str(&self.config.obj_name, args, kwargs);
        let entries = if self.config.entries.is_empty() {
            ".".to_string()
        } else {
            format!(" with entries {}.", entries_list(&self.config.entries))
        };
        format!(
            "Your `{}` malfunctioned when called as `{call_str}`{entries}",
            self.config.obj_name
        )
    }

    fn fail(&self, failure: Failure, preamble: String) -> Failure {
        failure
            .with_context(preamble)
            .with_extra_hint(&self.config.hint)
            .with_transcript(self.format_log())
    }

    /// Value returned by the last successful call.
    pub fn returned_values(&self) -> Option<&Value> {
        self.returned.as_ref()
    }

    /// Log offsets recorded before each prompt, starting with 0.
    pub fn checkpoints(&self) -> Vec<usize> {
        lock(&self.checkpoints).clone()
    }

    /// Entire transcript.
    pub fn log_contents(&self) -> String {
        lock(&self.log).contents().to_string()
    }

    fn checkpoint(&self, interaction: usize) -> Result<usize, Failure> {
        let checkpoints = self.checkpoints();
        checkpoints.get(interaction).copied().ok_or_else(|| {
            Failure::index_out_of_range(format!(
                "Looking for output after the {} input prompt, but the program only \
                 asked for input {} time(s).",
                ordinalize(interaction as i64),
                checkpoints.len().saturating_sub(1)
            ))
            .with_transcript(self.format_log())
        })
    }

    /// Lines `[start, start + n_lines)` (1-based) after checkpoint `interaction`.
    ///
    /// `n_lines` of `None` or `Some(0)` reads through the end.
    pub fn read_log_lines(
        &self,
        interaction: usize,
        start: usize,
        n_lines: Option<usize>,
    ) -> Result<Vec<String>, Failure> {
        let offset = self.checkpoint(interaction)?;
        let lines = lock(&self.log).read_lines_from(offset);
        let start = start.saturating_sub(1);
        let stop = match n_lines {
            Some(n) if n > 0 => start.saturating_add(n).min(lines.len()),
            _ => lines.len(),
        };
        Ok(lines.get(start..stop).map(<[String]>::to_vec).unwrap_or_default())
    }

    /// The window of [`Self::read_log_lines`] joined into one string.
    pub fn read_log(
        &self,
        interaction: usize,
        start: usize,
        n_lines: Option<usize>,
    ) -> Result<String, Failure> {
        Ok(self.read_log_lines(interaction, start, n_lines)?.concat())
    }

    /// Line `line_n` (1-based) after checkpoint `interaction`.
    pub fn read_log_line(&self, interaction: usize, line_n: usize) -> Result<String, Failure> {
        let lines = self.read_log_lines(interaction, 1, None)?;
        line_n
            .checked_sub(1)
            .and_then(|index| lines.get(index))
            .cloned()
            .ok_or_else(|| {
                Failure::index_out_of_range(format!(
                    "Looking for line {line_n}, but output only has {} lines.",
                    lines.len()
                ))
                .with_transcript(format_lines(&lines))
            })
    }

    /// Every number-like token in the selected line, left to right.
    ///
    /// Thousands separators are stripped before parsing.
    pub fn get_values(&self, interaction: usize, line_n: usize) -> Result<Vec<f64>, Failure> {
        let line = self.read_log_line(interaction, line_n)?;
        NUMBER
            .find_iter(&line)
            .map(|token| {
                let digits = token.as_str().replace(',', "");
                digits.parse::<f64>().map_err(|err| {
                    Failure::unclassified("ValueError", &format!("{digits}: {err}"))
                })
            })
            .collect()
    }

    /// The `value_n`-th (1-based) number in the selected line.
    pub fn get_value(
        &self,
        interaction: usize,
        line_n: usize,
        value_n: usize,
    ) -> Result<f64, Failure> {
        let values = self.get_values(interaction, line_n)?;
        value_n
            .checked_sub(1)
            .and_then(|index| values.get(index))
            .copied()
            .ok_or_else(|| {
                let window = self.read_log_lines(interaction, 1, None).unwrap_or_default();
                Failure::index_out_of_range(format!(
                    "Looking for the {} value in the {} output line, but only found {} \
                     value(s) in line {line_n}.",
                    ordinalize(value_n as i64),
                    ordinalize(line_n as i64),
                    values.len()
                ))
                .with_transcript(format_lines(&window))
            })
    }

    /// The whole transcript with 1-based line numbers, or `""` when empty.
    pub fn format_log(&self) -> String {
        let lines = lock(&self.log).read_lines_from(0);
        format_lines(&lines)
    }
}

fn format_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "\n\nline |Input/Output Log:\n{}\n",
        "-".repeat(LOG_RULE_WIDTH)
    );
    for (n, line) in lines.iter().enumerate() {
        out.push_str(&format!("{:4} |{line}", n + 1));
    }
    out
}

/// The `input()` replacement: checkpoint, echo the prompt, answer with the next entry.
fn responder(
    log: &SharedLog,
    checkpoints: &Arc<Mutex<Vec<usize>>>,
    entries: &Arc<Mutex<VecDeque<String>>>,
) -> Patch {
    let log = Arc::clone(log);
    let checkpoints = Arc::clone(checkpoints);
    let entries = Arc::clone(entries);
    Patch::function(INPUT, move |args, _| {
        let prompt = args.first().map(display).unwrap_or_default();
        let mut log = lock(&log);
        lock(&checkpoints).push(log.tell());
        log.write(&prompt)?;
        let entry = lock(&entries).pop_front().ok_or(Interrupt::EndOfInput)?;
        log.write(&format!("{entry}\n"))?;
        Ok(Value::String(entry))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use crate::test_support::{config, registry, serial};
    use serde_json::json;

    fn greeter(entries: &[&str]) -> SimulatedUser {
        let cfg = Config {
            sub_module: "greeter".to_string(),
            entries: entries.iter().map(|e| e.to_string()).collect(),
            ..config()
        };
        SimulatedUser::submission(&registry(), &cfg).expect("import greeter")
    }

    #[test]
    fn format_log_numbers_lines() {
        let _guard = serial();
        let mut user = greeter(&["AJ"]);
        user.call(&[], &Map::new()).expect("call");
        let expected = format!(
            "\n\nline |Input/Output Log:\n{}\n   1 |What is your name? AJ\n   2 |Hello, AJ!\n",
            "-".repeat(70)
        );
        assert_eq!(user.format_log(), expected);
    }

    #[test]
    fn format_log_is_empty_before_any_output() {
        let _guard = serial();
        let user = greeter(&[]);
        assert_eq!(user.format_log(), "");
    }

    #[test]
    fn windows_are_one_based_and_clamped() {
        let _guard = serial();
        let mut user = greeter(&["AJ"]);
        user.call(&[], &Map::new()).expect("call");
        assert_eq!(
            user.read_log_lines(0, 2, Some(1)).expect("window"),
            vec!["Hello, AJ!\n"]
        );
        assert_eq!(user.read_log_lines(0, 1, Some(0)).expect("window").len(), 2);
        assert!(user.read_log_lines(0, 5, None).expect("window").is_empty());
        assert_eq!(
            user.read_log(1, 1, None).expect("joined"),
            "What is your name? AJ\nHello, AJ!\n"
        );
    }

    #[test]
    fn unknown_interaction_is_index_failure() {
        let _guard = serial();
        let mut user = greeter(&["AJ"]);
        user.call(&[], &Map::new()).expect("call");
        let err = user.read_log_lines(2, 1, None).expect_err("no third checkpoint");
        assert_eq!(err.kind, FailureKind::IndexOutOfRange);
    }

    #[test]
    fn numbers_with_separators_and_exponents() {
        let _guard = serial();
        let mut registry = registry();
        registry.register_module(
            "numbers",
            crate::importer::Module::new().function("main", |_, _| {
                runtime::print("Totals: 1,234.5 and -7 then 3.0e+2 or 12345")?;
                Ok(Value::Null)
            }),
        );
        let cfg = Config {
            sub_module: "numbers".to_string(),
            ..config()
        };
        let mut user = SimulatedUser::submission(&registry, &cfg).expect("import");
        user.call(&[], &Map::new()).expect("call");
        assert_eq!(
            user.get_values(0, 1).expect("values"),
            vec![1234.5, -7.0, 300.0, 12345.0]
        );
    }

    #[test]
    fn preamble_names_call_and_entries() {
        let _guard = serial();
        let mut user = greeter(&["AJ", "extra"]);
        let err = user
            .call(&[json!("Jack")], &Map::new())
            .expect_err("unconsumed");
        assert_eq!(
            err.context.as_deref(),
            Some(
                "Your `main` malfunctioned when called as `main(\"Jack\")` with entries \
                 [\"AJ\",\"extra\"]."
            )
        );
    }
}
