//! Structural diffs between two trees.
//!
//! ```
//! use cfgdelta_core::alignment::align_heuristically;
//! use cfgdelta_core::diff::build_diff_from_alignment;
//! use cfgdelta_core::model::{NodeStore, Value};
//!
//! let mut store = NodeStore::new();
//! let old = store.record("A", [("x", Value::from(1i64))]);
//! let new = store.record("A", [("x", Value::from(2i64))]);
//! let alignment = align_heuristically(&store, &old, &new).unwrap();
//! let diff = build_diff_from_alignment(&alignment).unwrap();
//! assert_eq!(diff.len(), 1);
//! ```

pub mod builder;
pub mod model;
pub mod summary;

pub use builder::{build_diff_from_alignment, DiffBuilder};
pub use model::{
    Diff, DiffOperation, DiffValue, OperationKind, Reference, ResolvedDiff, ResolvedOperation,
    NEW_SHARED_VALUES_ROOT, OLD_ROOT,
};
pub use summary::render_diff_summary;
