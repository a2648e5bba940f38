//! Text helpers for failure messages and check descriptions.

use serde_json::{Map, Value};

/// Column limit for filled paragraphs, indent included.
pub const WIDTH: usize = 70;
const INDENT: &str = "  ";

/// Fill `text` into lines of at most [`WIDTH`] columns, each indented by two spaces.
///
/// Newlines are treated as spaces. Runs of spaces inside a line are kept, so a
/// sentence break written as two spaces survives filling.
pub fn fill(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::from(INDENT);
    let mut has_content = false;

    for word in flat.split(' ') {
        if !has_content {
            if word.is_empty() {
                continue;
            }
            line.push_str(word);
            has_content = true;
            continue;
        }
        let candidate = line.chars().count() + 1 + word.chars().count();
        if candidate > WIDTH && !word.is_empty() {
            lines.push(line.trim_end().to_string());
            line = format!("{INDENT}{word}");
        } else {
            line.push(' ');
            line.push_str(word);
        }
    }
    if has_content {
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

/// Render a value the way it appears in a call string: strings quoted, other
/// values as compact JSON.
pub fn repr(value: &Value) -> String {
    value.to_string()
}

/// Render a value the way code under test would print it: strings bare.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Construct a call string such as `main("Jack", greeting="Hi")`.
pub fn make_call_str(func_name: &str, args: &[Value], kwargs: &Map<String, Value>) -> String {
    let mut parts: Vec<String> = args.iter().map(repr).collect();
    parts.extend(kwargs.iter().map(|(k, v)| format!("{k}={}", repr(v))));
    format!("{func_name}({})", parts.join(", "))
}

/// Return the ordinal representation of `n` (`1st`, `12th`, `23rd`, ...).
pub fn ordinalize(n: i64) -> String {
    let ones = n.abs() % 10;
    let tens = n.abs() % 100;
    let suffix = match ones {
        1 if tens != 11 => "st",
        2 if tens != 12 => "nd",
        3 if tens != 13 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Describe the line window being checked (`line 3`, `lines 2 through 4`).
pub fn make_line_range(start: usize, n_lines: Option<usize>) -> String {
    match n_lines {
        Some(1) => format!("line {start}"),
        Some(n) if n > 0 => format!("lines {start} through {}", start + n - 1),
        _ => format!("lines {start} through the end"),
    }
}

/// Join items as an Oxford-comma list.
pub fn oxford_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

/// A transcript character cap derived from the reference transcript.
pub fn calc_log_limit(expected_log: &str) -> usize {
    let expected = expected_log.chars().count() as f64;
    (200.0 + 1.5 * expected) as usize
}

/// Render entries as a JSON list for messages.
pub fn entries_list(entries: &[String]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| format!("{entries:?}"))
}
