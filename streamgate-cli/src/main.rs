//! Streamgate — change detection and routing for table stream batches.
//!
//! # Usage
//!
//! ```text
//! streamgate detect --before <file> --after <file> --op MODIFY --models Order,Invoice [--json]
//! streamgate route <record.json> --service <id> [--json]
//! streamgate process <event.json> [--config <yaml>] [--dry-run | --remote] [--json]
//! streamgate config check [--config <yaml>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, detect::DetectArgs, process::ProcessArgs, route::RouteArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "streamgate",
    version,
    about = "Detect model changes in table stream batches and route them downstream",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two snapshots and report whether the model changed.
    Detect(DetectArgs),

    /// Show the routing plan for one packaged change record.
    Route(RouteArgs),

    /// Decode, detect and route a raw stream payload.
    Process(ProcessArgs),

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    streamgate_processor::init_tracing();
    match cli.command {
        Commands::Detect(args) => args.run(),
        Commands::Route(args) => args.run(),
        Commands::Process(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
