use clap::{Parser, Subcommand};

use crate::commands::parse::{self, ParseArgs};
use crate::commands::snapshot::{self, SnapshotCommand};

#[derive(Parser)]
#[command(name = "jjs")]
#[command(about = "JJS front-end CLI: parse scripts and drive the snapshot codec", version, author)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a script and print a summary of its compiled-code tree
    Parse(Box<ParseArgs>),

    /// Save, load, or merge snapshot images
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Parse(args) => parse::execute(*args),
        Commands::Snapshot(command) => snapshot::execute(command),
    }
}
