//! cfgdelta core - structural diffs of configuration graphs
//!
//! This crate holds the in-memory kernel:
//! - an arena of records, sequences, mappings and sets (`model`)
//! - typed paths into that arena (`path`)
//! - alignment of old and new nodes, by identity and by heuristics (`alignment`)
//! - diff construction with shared-value detection (`diff`)
//! - reference resolution, atomic application and statement emission
//!   (`resolve`, `apply`, `emit`)
//! - JSON interchange for trees (`interchange`)
//!
//! Everything here is synchronous and pure apart from store mutation. The
//! boundary logging lives in `cfgdelta-engine`.

pub mod alignment;
pub mod apply;
pub mod diff;
pub mod emit;
pub mod errors;
pub mod interchange;
pub mod logging_facility;
pub mod model;
pub mod path;
pub mod resolve;
pub mod traversal;

#[doc(hidden)]
pub use cfgdelta_core_types as core_types;

// Re-export commonly used types
pub use alignment::{align_by_id, align_heuristically, AlignmentPasses, DiffAlignment};
pub use apply::{apply_diff, apply_resolved_diff};
pub use diff::{build_diff_from_alignment, Diff, DiffOperation, DiffValue, Reference, ResolvedDiff};
pub use emit::{emit_statements, EmitOptions, Expr, Statement};
pub use errors::{ApplyError, ApplyFailure, DeltaError, ExError, ExErrorKind, Result};
pub use model::{Key, Node, NodeId, NodeStore, Record, Scalar, TypeSchema, Value};
pub use path::{Path, PathElement};
pub use resolve::{resolve_diff_references, unresolve};
