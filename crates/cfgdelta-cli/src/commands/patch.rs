//! Patch command
//!
//! Usage: cfgdelta patch <OLD> <DIFF>

use clap::Args;
use std::path::PathBuf;

use cfgdelta_core::diff::Diff;
use cfgdelta_core::interchange::export_json;
use cfgdelta_core::model::NodeStore;

use super::{load_tree, CliResult};

#[derive(Debug, Args)]
pub struct PatchArgs {
    /// Tree to patch (JSON)
    pub old: PathBuf,

    /// Diff to apply (JSON, as printed by `diff --json`)
    pub diff: PathBuf,
}

/// Execute patch command
pub fn execute(args: PatchArgs) -> CliResult {
    let mut store = NodeStore::new();
    let old = load_tree(&mut store, &args.old)?;
    let text = std::fs::read_to_string(&args.diff)
        .map_err(|e| format!("cannot read {}: {}", args.diff.display(), e))?;
    let diff: Diff = serde_json::from_str(&text)?;

    cfgdelta_engine::apply_diff(&diff, &mut store, &old)?;

    println!("{}", serde_json::to_string_pretty(&export_json(&store, &old)?)?);
    Ok(())
}
