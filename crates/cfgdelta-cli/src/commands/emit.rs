//! Emit command
//!
//! Usage: cfgdelta emit <OLD> <NEW> [--root <NAME>] [--options <FILE>]

use clap::Args;
use std::path::PathBuf;

use cfgdelta_core::model::NodeStore;

use super::{load_options, load_tree, CliResult};

#[derive(Debug, Args)]
pub struct EmitArgs {
    /// Old tree (JSON)
    pub old: PathBuf,

    /// New tree (JSON)
    pub new: PathBuf,

    /// Variable name of the tree being patched (overrides the options file)
    #[arg(long)]
    pub root: Option<String>,

    /// Engine options (TOML)
    #[arg(long)]
    pub options: Option<PathBuf>,
}

/// Execute emit command
pub fn execute(args: EmitArgs) -> CliResult {
    let mut options = load_options(args.options.as_deref())?;
    if let Some(root) = args.root {
        options.emit.root_name = root;
    }
    let mut store = NodeStore::new();
    let old = load_tree(&mut store, &args.old)?;
    let new = load_tree(&mut store, &args.new)?;

    let diff = cfgdelta_engine::diff_trees(&store, &old, &new, &options)?;
    let statements = cfgdelta_engine::emit_statements(&diff, &store, Some(&old), &options.emit)?;

    println!("{}", serde_json::to_string_pretty(&statements)?);
    Ok(())
}
