//! Reference resolution and diff application with boundary logging.

use std::time::Instant;

use cfgdelta_core::apply;
use cfgdelta_core::diff::{Diff, ResolvedDiff};
use cfgdelta_core::errors::Result;
use cfgdelta_core::model::{NodeStore, Value};
use cfgdelta_core::resolve;
use cfgdelta_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;

/// Replace every reference in `diff` with a concrete value in `store`
///
/// # Errors
///
/// Returns `UnknownReferenceRoot` or `InvalidReferenceTarget` for references
/// that cannot be followed.
pub fn resolve_diff_references(diff: &Diff, store: &mut NodeStore, old: &Value) -> Result<ResolvedDiff> {
    log_op_start!(
        "resolve_diff_references",
        old_root = %old,
        change_count = diff.len(),
        shared_count = diff.new_shared_values.len()
    );
    let start = Instant::now();

    let resolved = resolve::resolve_diff_references(diff, store, old).map_err(|e| {
        log_op_error!("resolve_diff_references", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("resolve_diff_references", duration_ms = elapsed_ms(start));
    Ok(resolved)
}

/// Apply `diff` to the tree under `old`, all or nothing
///
/// # Errors
///
/// Returns resolution errors, or `Apply` listing every change that failed.
/// The store is unchanged on error.
pub fn apply_diff(diff: &Diff, store: &mut NodeStore, old: &Value) -> Result<()> {
    log_op_start!("apply_diff", old_root = %old, change_count = diff.len());
    let start = Instant::now();

    apply::apply_diff(diff, store, old).map_err(|e| {
        let failure_count = e.apply_failures().map_or(0, <[_]>::len);
        log_op_error!(
            "apply_diff",
            e.clone(),
            duration_ms = elapsed_ms(start),
            failure_count = failure_count
        );
        e
    })?;

    log_op_end!("apply_diff", duration_ms = elapsed_ms(start));
    Ok(())
}
