//! `winstate` binary entry point.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use winstate_cli::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let command = args.command.name();
    logging::init_subscriber(args.verbose, args.global.json, command);

    let mut logger = logging::Logger::new(command);
    if args.global.json {
        logger = logger.without_progress();
    }
    let log = Arc::new(logger);

    match &args.command {
        cli::Command::Plan(opts) => commands::apply::run(&args.global, opts, true, &log),
        cli::Command::Apply(opts) => commands::apply::run(&args.global, opts, false, &log),
        cli::Command::Info(opts) => {
            commands::info::run(&args.global, opts, &log, &mut std::io::stdout().lock())
        }
        cli::Command::Schema(opts) => {
            commands::schema::run(opts, args.global.json, &mut std::io::stdout().lock())
        }
        cli::Command::Version => Ok(commands::version::run(&mut std::io::stdout().lock())?),
    }
}
