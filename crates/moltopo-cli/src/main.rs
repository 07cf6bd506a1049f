mod cli;
mod commands;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use clap::Parser;
use tracing::{debug, info};

fn main() {
    let cli = Cli::parse();
    logging::setup(cli.verbose, cli.quiet);
    debug!("parsed CLI arguments: {:?}", cli);

    let result = match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Convert(args) => commands::convert::run(args),
    };

    match result {
        Ok(()) => info!("command completed"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
