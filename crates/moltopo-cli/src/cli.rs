use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "moltopo", version, about = "Molecular topology inspection and conversion")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print a summary of a topology file.
    Info(InfoArgs),
    /// Read a topology file and write it back out.
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input .gro file.
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input .gro file.
    pub input: PathBuf,
    /// Output .gro file.
    pub output: PathBuf,
    /// Decimal places for coordinates.
    #[arg(long, default_value_t = 3)]
    pub precision: usize,
}
