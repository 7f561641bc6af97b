//! cfgdelta engine - orchestration layer
//!
//! Wraps the core diff pipeline in boundary-logged operations and loads
//! engine options from TOML. Callers that want lifecycle events for every
//! step use these functions rather than the core ones.

pub mod commands;
pub mod options;

pub use commands::diff::{align_by_id, align_heuristically, build_diff_from_alignment, diff_trees};
pub use commands::emit::emit_statements;
pub use commands::patch::{apply_diff, resolve_diff_references};
pub use options::{AlignmentOptions, AlignmentStrategy, EngineOptions};
