pub mod diff;
pub mod emit;
pub mod patch;

use cfgdelta_core::interchange::import_json_str;
use cfgdelta_core::model::{NodeStore, Value};
use cfgdelta_engine::EngineOptions;
use std::path::Path;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Read a JSON tree file into `store`
pub fn load_tree(store: &mut NodeStore, path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(import_json_str(store, &text)?)
}

/// Options from `--options FILE`, or the defaults
pub fn load_options(path: Option<&Path>) -> Result<EngineOptions, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => EngineOptions::from_file(path)?,
        None => EngineOptions::default(),
    })
}
