//! cfgdelta CLI
//!
//! Diff, emit and patch JSON configuration trees

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "cfgdelta")]
#[command(about = "cfgdelta - structural diffs of configuration trees", long_about = None)]
struct Cli {
    /// Log pipeline steps to stderr (RUST_LOG overrides the filter)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the diff from OLD to NEW
    Diff(commands::diff::DiffArgs),
    /// Print the statements that turn OLD into NEW, as JSON
    Emit(commands::emit::EmitArgs),
    /// Apply a JSON diff to OLD and print the result
    Patch(commands::patch::PatchArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        cfgdelta_core::logging_facility::init(cfgdelta_core::logging_facility::Profile::Development);
    } else if std::env::var_os("RUST_LOG").is_some() {
        cfgdelta_core::logging_facility::init(cfgdelta_core::logging_facility::Profile::Production);
    }

    let result = match cli.command {
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Emit(args) => commands::emit::execute(args),
        Commands::Patch(args) => commands::patch::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
