//! `packsync` command-line entry point.
use anyhow::Result;
use clap::Parser;

use packsync::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    logging::init_subscriber(args.verbose, args.command.name());

    match args.command {
        cli::Command::List(opts) => commands::list::run(&args.global, &opts),
        cli::Command::Install(opts) => commands::install::run(&args.global, &opts),
        cli::Command::Remove(opts) => commands::remove::run(&args.global, &opts),
        cli::Command::Sync(opts) => commands::sync::run(&opts),
        cli::Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Version output is the command's result, not a log event.
#[allow(clippy::print_stdout)]
fn print_version() {
    let version = option_env!("PACKSYNC_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    println!("packsync {version}");
}
