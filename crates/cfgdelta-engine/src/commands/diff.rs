//! Alignment and diff construction with boundary logging.

use std::time::Instant;

use cfgdelta_core::alignment::{self, DiffAlignment};
use cfgdelta_core::diff::{self, Diff};
use cfgdelta_core::errors::Result;
use cfgdelta_core::model::{NodeStore, Value};
use cfgdelta_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;
use crate::options::{AlignmentOptions, AlignmentStrategy, EngineOptions};

/// Align every node that both trees reach under the same handle
///
/// # Errors
///
/// Returns `NodeNotFound` if either tree has a dangling handle.
pub fn align_by_id<'s>(store: &'s NodeStore, old: &Value, new: &Value) -> Result<DiffAlignment<'s>> {
    log_op_start!("align_by_id", old_root = %old, new_root = %new);
    let start = Instant::now();

    let alignment = alignment::align_by_id(store, old, new).map_err(|e| {
        log_op_error!("align_by_id", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "align_by_id",
        duration_ms = elapsed_ms(start),
        aligned_count = alignment.len()
    );
    Ok(alignment)
}

/// Align by identity, same path and, unless disabled, structural equality
///
/// # Errors
///
/// Returns `NodeNotFound` if either tree has a dangling handle.
pub fn align_heuristically<'s>(
    store: &'s NodeStore,
    old: &Value,
    new: &Value,
    options: &AlignmentOptions,
) -> Result<DiffAlignment<'s>> {
    log_op_start!(
        "align_heuristically",
        old_root = %old,
        new_root = %new,
        equality_pass = options.equality_pass
    );
    let start = Instant::now();

    let alignment = alignment::align_with_passes(store, old, new, options.passes())
        .map(|alignment| alignment.with_names(&options.old_name, &options.new_name))
        .map_err(|e| {
            log_op_error!("align_heuristically", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

    log_op_end!(
        "align_heuristically",
        duration_ms = elapsed_ms(start),
        aligned_count = alignment.len()
    );
    Ok(alignment)
}

/// Build the diff that turns the alignment's old tree into its new tree
///
/// # Errors
///
/// Returns `BuilderInvariant` if the alignment is inconsistent with the
/// store, and `NodeNotFound` for dangling handles.
pub fn build_diff_from_alignment(alignment: &DiffAlignment<'_>) -> Result<Diff> {
    log_op_start!("build_diff_from_alignment", aligned_count = alignment.len());
    let start = Instant::now();

    let result = diff::build_diff_from_alignment(alignment).map_err(|e| {
        log_op_error!("build_diff_from_alignment", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "build_diff_from_alignment",
        duration_ms = elapsed_ms(start),
        change_count = result.len(),
        shared_count = result.new_shared_values.len()
    );
    Ok(result)
}

/// Align and diff two trees in one step
///
/// # Errors
///
/// Same as the alignment and build steps.
pub fn diff_trees(store: &NodeStore, old: &Value, new: &Value, options: &EngineOptions) -> Result<Diff> {
    log_op_start!(
        "diff_trees",
        old_root = %old,
        new_root = %new,
        alignment = ?options.alignment
    );
    let start = Instant::now();

    let result = diff_trees_impl(store, old, new, options).map_err(|e| {
        log_op_error!("diff_trees", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "diff_trees",
        duration_ms = elapsed_ms(start),
        change_count = result.len(),
        shared_count = result.new_shared_values.len()
    );
    Ok(result)
}

fn diff_trees_impl(store: &NodeStore, old: &Value, new: &Value, options: &EngineOptions) -> Result<Diff> {
    let alignment = match options.alignment {
        AlignmentStrategy::Identity => alignment::align_by_id(store, old, new)?,
        AlignmentStrategy::Heuristic => {
            alignment::align_with_passes(store, old, new, options.alignment_options().passes())?
        }
    }
    .with_names(&options.old_name, &options.new_name);
    tracing::debug!(alignment = %alignment, "aligned trees");
    diff::build_diff_from_alignment(&alignment)
}
