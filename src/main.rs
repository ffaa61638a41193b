use anyhow::Result;
use clap::Parser;
use scenario_director::cli::{Command, RootArgs};
use scenario_director::{logging, workflow};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    logging::init(args.verbose);

    match args.command {
        Command::Check(args) => workflow::run_check(args),
        Command::Run(args) => workflow::run_scenario(args),
    }
}
