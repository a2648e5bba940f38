//! Compare a window of output lines against the reference.

use anyhow::Result;
use harness::format::make_line_range;
use harness::{Config, ModuleRegistry};

use super::{
    call_phrase, mismatch, required_config, run_reference_then_submission, with_config_hint,
};
use crate::scoring::weighted;
use crate::suite::{CheckClass, CheckContext, Params, check};

pub fn describe(params: &Params) -> String {
    let Some(config) = params.config() else {
        return "Check that the output lines match the reference.".to_string();
    };
    format!(
        "Check that {} of output from your `{}` function when called as {} match the reference.",
        make_line_range(config.start, config.n_lines),
        config.obj_name,
        call_phrase(config)
    )
}

fn run(registry: &ModuleRegistry, ctx: &mut CheckContext<'_>, params: &Params) -> Result<()> {
    let config = required_config(params)?;
    ctx.report(0.0);
    let (reference, submission) = run_reference_then_submission(registry, config)?;

    let expected = reference.read_log_lines(config.interaction, config.start, config.n_lines)?;
    let actual = submission.read_log_lines(config.interaction, config.start, config.n_lines)?;

    if actual != expected {
        let hint = with_config_hint(
            format!(
                "Your output did not match the expected output.  Double check {} of \
                 your `{}` function when called as {}.",
                make_line_range(config.start, config.n_lines),
                config.obj_name,
                call_phrase(config)
            ),
            config,
        );
        return Err(mismatch(
            &format!("Expected {:?}, but found {:?}.", expected.concat(), actual.concat()),
            &hint,
            &submission,
        ));
    }
    ctx.report(config.weight);
    Ok(())
}

pub fn build(registry: ModuleRegistry, configs: Vec<Config>) -> CheckClass {
    CheckClass::new("OutputLinesMatchReference").expand(
        "check_output_lines_match_reference",
        configs.into_iter().map(Params::from_config).collect(),
        describe,
        weighted(check(move |ctx, params| run(&registry, ctx, params))),
    )
}
