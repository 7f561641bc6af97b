//! Diff command
//!
//! Usage: cfgdelta diff <OLD> <NEW> [--options <FILE>] [--json]

use clap::Args;
use std::path::PathBuf;

use cfgdelta_core::diff::render_diff_summary;
use cfgdelta_core::model::NodeStore;

use super::{load_options, load_tree, CliResult};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Old tree (JSON)
    pub old: PathBuf,

    /// New tree (JSON)
    pub new: PathBuf,

    /// Engine options (TOML)
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Print the diff as JSON instead of the summary
    #[arg(long)]
    pub json: bool,
}

/// Execute diff command
pub fn execute(args: DiffArgs) -> CliResult {
    let options = load_options(args.options.as_deref())?;
    let mut store = NodeStore::new();
    let old = load_tree(&mut store, &args.old)?;
    let new = load_tree(&mut store, &args.new)?;

    let diff = cfgdelta_engine::diff_trees(&store, &old, &new, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        println!("{}", render_diff_summary(&diff));
    }
    Ok(())
}
