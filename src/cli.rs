//! CLI argument parsing for scenario checks and dry runs.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default number of ticks for a dry run (30 simulated seconds at the default step).
pub const DEFAULT_TICKS: u32 = 600;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "sdir",
    version,
    about = "Tick-driven traffic scenario director",
    after_help = "Commands:\n  check --scenario <file>  Validate a scenario against a map without spawning\n  run --scenario <file>    Execute a scenario against the kinematic engine\n\nExamples:\n  sdir check --scenario demos/crossing.json\n  sdir check --scenario demos/crossing.json --json\n  sdir run --scenario demos/crossing.json --ticks 400 --report /tmp/run.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Check(CheckArgs),
    Run(RunArgs),
}

/// Check command inputs.
#[derive(Parser, Debug)]
#[command(about = "Validate a scenario and report spawn indices a run would skip")]
pub struct CheckArgs {
    /// Scenario JSON document
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Spawn-point map JSON (defaults to the built-in town)
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Execute a scenario tick by tick and tear it down")]
pub struct RunArgs {
    /// Scenario JSON document
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Spawn-point map JSON (defaults to the built-in town)
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Number of ticks to simulate before cleanup
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TICKS)]
    pub ticks: u32,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}
