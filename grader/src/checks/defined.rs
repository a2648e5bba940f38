//! Check that the submission defines the requested callable.

use anyhow::Result;
use harness::failure::format_error_msg;
use harness::{Config, ModuleRegistry};

use super::{required_config, with_config_hint};
use crate::scoring::weighted;
use crate::suite::{CheckClass, CheckContext, Params, check};

pub fn describe(params: &Params) -> String {
    match params.config() {
        Some(config) => format!(
            "Check that callable `{}` is defined in module `{}`.",
            config.obj_name, config.sub_module
        ),
        None => "Check that the callable is defined.".to_string(),
    }
}

fn run(registry: &ModuleRegistry, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
    let config = required_config(params)?;
    ctx.report(0.0);
    let object = registry.import(&config.sub_module, &config.obj_name, &config.limits())?;

    if !object.is_function() {
        let name = &config.obj_name;
        let hint = with_config_hint(
            format!(
                "Define the `{name}` function in your `{}` module using a function \
                 definition.  Also, make sure your function definition is not inside \
                 of any other block.",
                config.sub_module
            ),
            config,
        );
        anyhow::bail!(format_error_msg(
            &format!("The object `{name}` is not a function."),
            Some(&hint)
        ));
    }

    ctx.report(config.weight);
    Ok(())
}

pub fn build(registry: ModuleRegistry, configs: Vec<Config>) -> CheckClass {
    CheckClass::new("CallableIsDefined").expand(
        "check_callable_is_defined",
        configs.into_iter().map(Params::from_config).collect(),
        describe,
        weighted(check(move |ctx, params| run(&registry, ctx, params))),
    )
}
