//! Engine options, loadable from TOML.
//!
//! ```toml
//! alignment = "heuristic"   # or "identity"
//! equality_pass = true
//! old_name = "before"
//! new_name = "after"
//!
//! [emit]
//! root_name = "cfg"
//! reserved = ["self"]
//! ```
//!
//! Every field is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use cfgdelta_core::alignment::AlignmentPasses;
use cfgdelta_core::emit::EmitOptions;
use cfgdelta_core::errors::{DeltaError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentStrategy {
    /// Only nodes present in both trees under the same handle
    Identity,
    /// Identity, then same path, then structural equality
    #[default]
    Heuristic,
}

/// Knobs of the heuristic aligner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentOptions {
    pub equality_pass: bool,
    pub old_name: String,
    pub new_name: String,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            equality_pass: true,
            old_name: "old".to_string(),
            new_name: "new".to_string(),
        }
    }
}

impl AlignmentOptions {
    pub fn passes(&self) -> AlignmentPasses {
        AlignmentPasses {
            equality: self.equality_pass,
            ..AlignmentPasses::all()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    pub alignment: AlignmentStrategy,
    pub equality_pass: bool,
    pub old_name: String,
    pub new_name: String,
    pub emit: EmitOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let alignment = AlignmentOptions::default();
        Self {
            alignment: AlignmentStrategy::default(),
            equality_pass: alignment.equality_pass,
            old_name: alignment.old_name,
            new_name: alignment.new_name,
            emit: EmitOptions::default(),
        }
    }
}

impl EngineOptions {
    /// Parse options from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text is not valid TOML or names unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DeltaError::Config {
            message: e.to_string(),
        })
    }

    /// Load options from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Config` if it does not
    /// parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn alignment_options(&self) -> AlignmentOptions {
        AlignmentOptions {
            equality_pass: self.equality_pass,
            old_name: self.old_name.clone(),
            new_name: self.new_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let options = EngineOptions::from_toml_str("").unwrap();
        assert_eq!(options, EngineOptions::default());
        assert_eq!(options.alignment, AlignmentStrategy::Heuristic);
        assert!(options.equality_pass);
        assert_eq!(options.emit.root_name, "cfg");
    }

    #[test]
    fn test_partial_toml() {
        let options = EngineOptions::from_toml_str(
            "alignment = \"identity\"\nequality_pass = false\n\n[emit]\nroot_name = \"conf\"\n",
        )
        .unwrap();
        assert_eq!(options.alignment, AlignmentStrategy::Identity);
        assert!(!options.alignment_options().passes().equality);
        assert!(options.alignment_options().passes().path);
        assert_eq!(options.emit.root_name, "conf");
        assert!(options.emit.reserved.is_empty());
        assert_eq!(options.old_name, "old");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngineOptions::from_toml_str("alignment = [").unwrap_err();
        assert!(matches!(err, DeltaError::Config { .. }));

        let err = EngineOptions::from_toml_str("alignment = \"fuzzy\"").unwrap_err();
        assert!(matches!(err, DeltaError::Config { .. }));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cfgdelta.toml");
        fs::write(&path, "old_name = \"before\"\n\n[emit]\nreserved = [\"self\"]\n").unwrap();

        let options = EngineOptions::from_file(&path).unwrap();
        assert_eq!(options.old_name, "before");
        assert_eq!(options.emit.reserved, vec!["self".to_string()]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineOptions::from_file(Path::new("/nonexistent/cfgdelta.toml")).unwrap_err();
        assert!(matches!(err, DeltaError::Io { .. }));
    }
}
