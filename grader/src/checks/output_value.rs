//! Compare one number on one output line against the reference.

use anyhow::Result;
use harness::format::ordinalize;
use harness::{Config, ModuleRegistry};

use super::{
    call_phrase, mismatch, required_config, run_reference_then_submission, with_config_hint,
};
use crate::scoring::weighted;
use crate::suite::{CheckClass, CheckContext, Params, check};

pub fn describe(params: &Params) -> String {
    let Some(config) = params.config() else {
        return "Check that the output value matches the reference value.".to_string();
    };
    format!(
        "Check that the {} value on output line {} from your `{}` function when called \
         as {} matches the reference value.",
        ordinalize(config.value_n as i64),
        config.line_n,
        config.obj_name,
        call_phrase(config)
    )
}

fn run(registry: &ModuleRegistry, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
    let config = required_config(params)?;
    ctx.report(0.0);
    let (reference, submission) = run_reference_then_submission(registry, config)?;

    let expected = reference.get_value(config.interaction, config.line_n, config.value_n)?;
    let actual = submission.get_value(config.interaction, config.line_n, config.value_n)?;

    if actual != expected {
        let hint = with_config_hint(
            format!(
                "Your output values did not match the expected values.  Double check \
                 the {} value in the {} output line of your `{}` function when called \
                 as {}.",
                ordinalize(config.value_n as i64),
                ordinalize(config.line_n as i64),
                config.obj_name,
                call_phrase(config)
            ),
            config,
        );
        return Err(mismatch(
            &format!("Expected {expected}, but found {actual}."),
            &hint,
            &submission,
        ));
    }
    ctx.report(config.weight);
    Ok(())
}

pub fn build(registry: ModuleRegistry, configs: Vec<Config>) -> CheckClass {
    CheckClass::new("OutputValueMatchesReference").expand(
        "check_output_value_matches_reference",
        configs.into_iter().map(Params::from_config).collect(),
        describe,
        weighted(check(move |ctx, params| run(&registry, ctx, params))),
    )
}
