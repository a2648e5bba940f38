//! Test-only helpers: a serial lock, quick configs, and canned modules.
//!
//! Symbols are process-global, so every test that calls, imports, or patches
//! must hold [`serial`] for its whole body.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::config::Config;
use crate::error::Interrupt;
use crate::importer::{Module, ModuleRegistry};
use crate::limits::Limits;
use crate::runtime::{self, lock};

static SERIAL: Mutex<()> = Mutex::new(());

/// Serialize tests that touch the symbol table.
pub fn serial() -> MutexGuard<'static, ()> {
    lock(&SERIAL)
}

/// Default config without a memory ceiling (test threads share one address space).
pub fn config() -> Config {
    Config {
        memory_limit_gib: None,
        ..Config::default()
    }
}

/// One-second limits without a memory ceiling.
pub fn quick_limits() -> Limits {
    Limits {
        time_limit: Duration::from_secs(1),
        memory_limit_gib: None,
    }
}

fn greet(_: Vec<Value>, _: serde_json::Map<String, Value>) -> Result<Value, Interrupt> {
    let name = runtime::input("What is your name? ")?;
    runtime::print(&format!("Hello, {name}!"))?;
    Ok(Value::Null)
}

/// Registry of small modules covering each way a target can behave.
///
/// Every module exposes `main` unless noted otherwise:
/// - `hello`: prints `Hello, User!`.
/// - `greeter`, `reference`: ask for a name and greet it.
/// - `two_prompts`: ask for two numbers and print their sum.
/// - `adder`: return `a + b` from positional or keyword args.
/// - `appender`: push `"x"` onto its list argument and return it.
/// - `exits` / `quits`: print one line, then `exit()` / `quit()`.
/// - `spinner`: loop forever.
/// - `clock`: print the current time.
/// - `shouter`: print the result of `shouter.shout("hi")`.
/// - `hoarder`: try to reserve 3 GiB and report how much it got.
/// - `asks_at_import`: calls `input()` at import time.
/// - `exits_at_import`: prints `bye`, then calls `exit(3)` at import time.
/// - `broken`: cannot be parsed.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry
        .register_module(
            "hello",
            Module::new().function("main", |_, _| {
                runtime::print("Hello, User!")?;
                Ok(Value::Null)
            }),
        )
        .register_module("greeter", Module::new().function("main", greet))
        .register_module("reference", Module::new().function("main", greet))
        .register_module(
            "two_prompts",
            Module::new().function("main", |_, _| {
                let a = runtime::input("First number: ")?;
                let b = runtime::input("Second number: ")?;
                let a: f64 = a
                    .trim()
                    .parse()
                    .map_err(|_| {
                        Interrupt::raised("ValueError", format!("could not convert {a:?}"))
                    })?;
                let b: f64 = b
                    .trim()
                    .parse()
                    .map_err(|_| {
                        Interrupt::raised("ValueError", format!("could not convert {b:?}"))
                    })?;
                runtime::print(&format!("The sum of {a} and {b} is {}.", a + b))?;
                Ok(Value::Null)
            }),
        )
        .register_module(
            "adder",
            Module::new().function("main", |args, kwargs| {
                let arg = |index: usize, name: &str| {
                    args.get(index)
                        .or_else(|| kwargs.get(name))
                        .and_then(Value::as_f64)
                        .ok_or_else(|| {
                            Interrupt::raised("TypeError", format!("missing argument `{name}`"))
                        })
                };
                Ok(json!(arg(0, "a")? + arg(1, "b")?))
            }),
        )
        .register_module(
            "appender",
            Module::new().function("main", |mut args, _| {
                let Some(Value::Array(items)) = args.get_mut(0) else {
                    return Err(Interrupt::raised("TypeError", "expected a list"));
                };
                items.push(json!("x"));
                Ok(Value::Array(items.clone()))
            }),
        )
        .register_module(
            "exits",
            Module::new().function("main", |_, _| {
                runtime::print("Goodbye")?;
                runtime::exit(None)?;
                runtime::print("unreachable")?;
                Ok(Value::Null)
            }),
        )
        .register_module(
            "quits",
            Module::new().function("main", |_, _| {
                runtime::print("Goodbye")?;
                runtime::quit(Some(1))?;
                Ok(Value::Null)
            }),
        )
        .register_module(
            "spinner",
            Module::new().function("main", |_, _| {
                loop {
                    runtime::tick()?;
                    std::hint::spin_loop();
                }
            }),
        )
        .register_module(
            "clock",
            Module::new().function("main", |_, _| {
                let now = runtime::now()?;
                runtime::print(&now.format("%Y-%m-%d %H:%M").to_string())?;
                Ok(Value::Null)
            }),
        )
        .register_module(
            "shouter",
            Module::new()
                .function("shout", |args, _| {
                    let text = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(json!(text.to_uppercase()))
                })
                .function("main", |_, _| {
                    let loud = runtime::call("shouter.shout", vec![json!("hi")])?;
                    runtime::print(&crate::format::display(&loud))?;
                    Ok(Value::Null)
                }),
        )
        .register_module(
            "hoarder",
            Module::new().function("main", |_, _| {
                let mut hoard: Vec<u8> = Vec::new();
                hoard.try_reserve_exact(3 << 30)?;
                Ok(json!(hoard.capacity()))
            }),
        )
        .register("asks_at_import", || {
            runtime::input("Name? ")?;
            Ok(Module::new().function("main", greet))
        })
        .register("exits_at_import", || {
            runtime::print("bye")?;
            runtime::exit(Some(3))?;
            Ok(Module::new().function("main", greet))
        })
        .register("broken", || Err(Interrupt::syntax("invalid syntax")));
    registry
}

/// A temporary directory holding `check.toml` with `contents`.
pub fn config_file(contents: &str) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("check.toml");
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}
