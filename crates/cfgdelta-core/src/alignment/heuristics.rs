//! Automatic alignment passes
//!
//! Each pass only adds pairs that [`DiffAlignment::can_align`] accepts, so a
//! later pass never undoes an earlier one.

use std::collections::HashMap;

use crate::alignment::DiffAlignment;
use crate::errors::Result;
use crate::model::{NodeId, NodeStore, Value};
use crate::path::Path;
use crate::traversal::{for_each_path, structurally_equal, Reachable};

/// Which heuristic passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentPasses {
    pub identity: bool,
    pub path: bool,
    /// Costs O(|old| * |new|) structural comparisons
    pub equality: bool,
}

impl AlignmentPasses {
    pub fn all() -> Self {
        Self {
            identity: true,
            path: true,
            equality: true,
        }
    }

    pub fn identity_only() -> Self {
        Self {
            identity: true,
            path: false,
            equality: false,
        }
    }
}

impl Default for AlignmentPasses {
    fn default() -> Self {
        Self::all()
    }
}

/// Align every node reachable from both roots under the same handle
///
/// # Errors
///
/// Returns `NodeNotFound` if either graph has a dangling handle.
pub fn align_by_id<'s>(store: &'s NodeStore, old: &Value, new: &Value) -> Result<DiffAlignment<'s>> {
    align_with_passes(store, old, new, AlignmentPasses::identity_only())
}

/// Align by identity, then by path, then by structural equality
///
/// The equality pass may pair two unrelated nodes that merely look alike.
///
/// # Errors
///
/// Returns `NodeNotFound` if either graph has a dangling handle.
pub fn align_heuristically<'s>(
    store: &'s NodeStore,
    old: &Value,
    new: &Value,
) -> Result<DiffAlignment<'s>> {
    align_with_passes(store, old, new, AlignmentPasses::all())
}

/// Run the selected passes in their fixed order
///
/// # Errors
///
/// Returns `NodeNotFound` if either graph has a dangling handle.
pub fn align_with_passes<'s>(
    store: &'s NodeStore,
    old: &Value,
    new: &Value,
    passes: AlignmentPasses,
) -> Result<DiffAlignment<'s>> {
    let mut alignment = DiffAlignment::new(store, old.clone(), new.clone());
    let old_nodes = Reachable::walk(store, old)?;
    let new_nodes = Reachable::walk(store, new)?;

    if passes.identity {
        identity_pass(&mut alignment, &old_nodes, &new_nodes)?;
    }
    if passes.path {
        path_pass(&mut alignment, store, old, new)?;
    }
    if passes.equality {
        equality_pass(&mut alignment, store, &old_nodes, &new_nodes)?;
    }
    tracing::debug!(
        aligned_count = alignment.len(),
        old_nodes = old_nodes.len(),
        new_nodes = new_nodes.len(),
        "heuristic alignment complete"
    );
    Ok(alignment)
}

fn identity_pass(
    alignment: &mut DiffAlignment<'_>,
    old_nodes: &Reachable,
    new_nodes: &Reachable,
) -> Result<()> {
    for &id in old_nodes.order() {
        let value = Value::Node(id);
        if new_nodes.contains(id) && alignment.can_align(&value, &value) {
            alignment.align(&value, &value)?;
        }
    }
    Ok(())
}

fn path_pass(alignment: &mut DiffAlignment<'_>, store: &NodeStore, old: &Value, new: &Value) -> Result<()> {
    let mut new_by_path: HashMap<Path, NodeId> = HashMap::new();
    for_each_path(store, new, |path, id| {
        new_by_path.entry(path.clone()).or_insert(id);
    })?;

    let mut old_by_path: Vec<(Path, NodeId)> = Vec::new();
    for_each_path(store, old, |path, id| old_by_path.push((path.clone(), id)))?;

    for (path, old_id) in old_by_path {
        if let Some(&new_id) = new_by_path.get(&path) {
            let (old_value, new_value) = (Value::Node(old_id), Value::Node(new_id));
            if alignment.can_align(&old_value, &new_value) {
                alignment.align(&old_value, &new_value)?;
            }
        }
    }
    Ok(())
}

fn equality_pass(
    alignment: &mut DiffAlignment<'_>,
    store: &NodeStore,
    old_nodes: &Reachable,
    new_nodes: &Reachable,
) -> Result<()> {
    for &old_id in old_nodes.order() {
        let old_value = Value::Node(old_id);
        if alignment.is_old_aligned(&old_value) {
            continue;
        }
        let old_kind = store.get(old_id)?.kind();
        for &new_id in new_nodes.order() {
            let new_value = Value::Node(new_id);
            if store.get(new_id)?.kind() == old_kind
                && alignment.can_align(&old_value, &new_value)
                && structurally_equal(store, &old_value, &new_value)
            {
                alignment.align(&old_value, &new_value)?;
                break;
            }
        }
    }
    Ok(())
}
