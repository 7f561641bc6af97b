use std::collections::HashMap;

use crate::errors::Result;
use crate::model::{NodeId, NodeStore, Value};
use crate::traversal::Reachable;

/// Copy the subgraph under `root` into fresh handles.
///
/// Sharing and cycles inside the subgraph are preserved: every reachable
/// node is allocated once, then its children are remapped to the copies.
///
/// # Errors
///
/// Returns `NodeNotFound` if a handle in the graph is dangling.
pub fn deep_copy(store: &mut NodeStore, root: &Value) -> Result<Value> {
    let reachable = Reachable::walk(store, root)?;
    let mut copies: HashMap<NodeId, NodeId> = HashMap::with_capacity(reachable.len());
    for &id in reachable.order() {
        let node = store.get(id)?.clone();
        copies.insert(id, store.insert(node));
    }
    for &copy in copies.values() {
        for slot in store.get_mut(copy)?.values_mut() {
            if let Value::Node(child) = slot {
                if let Some(&mapped) = copies.get(child) {
                    *child = mapped;
                }
            }
        }
    }
    Ok(match root {
        Value::Node(id) => Value::Node(copies.get(id).copied().unwrap_or(*id)),
        leaf => leaf.clone(),
    })
}
