use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "grader", version, about = "Inspect grading configs and results")]
struct Cli {
    /// Enable debug logging for the grading crates.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print totals and per-check lines of a results file.
    Summarize { results: PathBuf },
    /// Load and validate a check configuration file.
    CheckConfig { config: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    harness::logging::init(cli.verbose)?;
    match cli.command {
        Command::Summarize { results } => grader::cli::summarize(&results),
        Command::CheckConfig { config } => grader::cli::check_config(&config),
    }
}
