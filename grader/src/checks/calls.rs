//! Compare the sequence of calls made to tracked functions.
//!
//! Each entry of `Config::tracked_calls` is a symbol path. A bare name such as
//! `shout` refers to the function published by the module under test
//! (`<module>.shout`); dotted paths are used as given. Every tracked symbol is
//! patched with a recorder that logs the call string and then delegates to the
//! original binding.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use harness::format::{make_call_str, oxford_list};
use harness::runtime::{self, Symbol};
use harness::{Config, ModuleRegistry, Patch, SimulatedUser};
use tracing::debug;

use super::{call_phrase, mismatch, required_config, with_config_hint};
use crate::scoring::weighted;
use crate::suite::{CheckClass, CheckContext, Params, check};

type CallLog = Arc<Mutex<Vec<String>>>;

pub fn describe(params: &Params) -> String {
    let Some(config) = params.config() else {
        return "Check that the function calls match the reference.".to_string();
    };
    format!(
        "Check that your `{}` function makes the same calls to {} as the reference \
         when called as {}.",
        config.obj_name,
        oxford_list(
            &config
                .tracked_calls
                .iter()
                .map(|name| format!("`{name}`"))
                .collect::<Vec<_>>()
        ),
        call_phrase(config)
    )
}

fn symbol_path(module: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{module}.{name}")
    }
}

/// Call `config.obj_name` from `module` with every tracked symbol recorded.
fn recorded_run(
    registry: &ModuleRegistry,
    module: &str,
    config: &Config,
) -> Result<(SimulatedUser, Vec<String>)> {
    registry.import(module, &config.obj_name, &config.limits())?;

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut recorded = config.clone();
    for name in &config.tracked_calls {
        let path = symbol_path(module, name);
        let original = match runtime::lookup(&path) {
            Some(Symbol::Function(callable)) => callable,
            _ => anyhow::bail!("tracked call `{path}` is not a function"),
        };
        let calls = Arc::clone(&calls);
        let label = name.clone();
        recorded = recorded.with_patch(Patch::function(path, move |args, kwargs| {
            calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(make_call_str(&label, &args, &kwargs));
            original.call(args, kwargs)
        }));
    }

    let mut user = SimulatedUser::new(registry, module, &recorded)?;
    user.call_configured()?;
    let calls = calls.lock().unwrap_or_else(PoisonError::into_inner).clone();
    debug!(module, calls = calls.len(), "recorded calls");
    Ok((user, calls))
}

fn run(registry: &ModuleRegistry, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
    let config = required_config(params)?;
    ctx.report(0.0);
    let (_, expected) = recorded_run(registry, &config.ref_module, config)
        .with_context(|| format!("reference module `{}` failed", config.ref_module))?;
    let (submission, actual) = recorded_run(registry, &config.sub_module, config)?;

    if actual != expected {
        let hint = with_config_hint(
            format!(
                "Your `{}` function did not make the expected calls when called as {}.  \
                 The expected calls were {}.",
                config.obj_name,
                call_phrase(config),
                if expected.is_empty() {
                    "none".to_string()
                } else {
                    oxford_list(&expected)
                }
            ),
            config,
        );
        return Err(mismatch(
            &format!("Expected calls {expected:?}, but found {actual:?}."),
            &hint,
            &submission,
        ));
    }
    ctx.report(config.weight);
    Ok(())
}

pub fn build(registry: ModuleRegistry, configs: Vec<Config>) -> CheckClass {
    CheckClass::new("FunctionCallsMatchReference").expand(
        "check_function_calls_match_reference",
        configs.into_iter().map(Params::from_config).collect(),
        describe,
        weighted(check(move |ctx, params| run(&registry, ctx, params))),
    )
}
