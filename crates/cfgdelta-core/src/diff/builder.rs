//! Diff construction from an alignment.
//!
//! One memoized descent of the new tree. Every node yields a diff value:
//! unaligned single-path nodes are copied inline, unaligned multi-path nodes
//! become entries of `new_shared_values`, and aligned nodes record their
//! field differences and become references into the old tree.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::alignment::DiffAlignment;
use crate::diff::model::{Diff, DiffOperation, DiffValue, Reference};
use crate::errors::{DeltaError, Result};
use crate::model::{Node, NodeId, NodeStore, Scalar, Value};
use crate::path::{Path, PathElement};
use crate::traversal::{multi_path_nodes, Reachable};

/// Single-use builder; see [`build_diff_from_alignment`]
pub struct DiffBuilder<'a, 's> {
    alignment: &'a DiffAlignment<'s>,
    store: &'s NodeStore,
    old_paths: Reachable,
    multi_path: HashSet<NodeId>,
    memo: HashMap<NodeId, DiffValue>,
    in_progress: HashSet<NodeId>,
    shared_slots: HashMap<NodeId, usize>,
    changes: BTreeMap<Path, DiffOperation>,
    new_shared_values: Vec<Option<DiffValue>>,
    built: bool,
}

impl<'a, 's> DiffBuilder<'a, 's> {
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either tree has a dangling handle.
    pub fn new(alignment: &'a DiffAlignment<'s>) -> Result<Self> {
        let store = alignment.store();
        Ok(Self {
            alignment,
            store,
            old_paths: Reachable::walk(store, alignment.old_root())?,
            multi_path: multi_path_nodes(store, alignment.new_root())?,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            shared_slots: HashMap::new(),
            changes: BTreeMap::new(),
            new_shared_values: Vec::new(),
            built: false,
        })
    }

    /// Build the diff from old to new
    ///
    /// # Errors
    ///
    /// Returns `DiffAlreadyBuilt` on a second call, `BuilderInvariant` if an
    /// aligned old node is unreachable from the old root or a shared slot is
    /// never filled.
    pub fn build_diff(&mut self) -> Result<Diff> {
        if self.built {
            return Err(DeltaError::DiffAlreadyBuilt);
        }
        self.built = true;

        let new_root = self.alignment.new_root().clone();
        if let Value::Node(id) = &new_root {
            if !self.alignment.is_new_aligned(&new_root) {
                tracing::debug!(new_root = %id, "new root is not aligned; no changes can reach it");
            }
        }
        self.visit(&new_root)?;

        let new_shared_values = std::mem::take(&mut self.new_shared_values)
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                value.ok_or_else(|| DeltaError::BuilderInvariant {
                    message: format!("new_shared_values[{}] was reserved but never filled", index),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let changes = std::mem::take(&mut self.changes);
        tracing::debug!(
            change_count = changes.len(),
            shared_count = new_shared_values.len(),
            "diff built"
        );
        Ok(Diff::new(changes, new_shared_values))
    }

    fn visit(&mut self, value: &Value) -> Result<DiffValue> {
        let id = match value {
            Value::Leaf(scalar) => return Ok(DiffValue::leaf(scalar.clone())),
            Value::Node(id) => *id,
        };
        if let Some(done) = self.memo.get(&id) {
            return Ok(done.clone());
        }

        let aligned_old = self.alignment.old_from_new(value);
        if self.in_progress.contains(&id) {
            // Back edge of a cycle
            return match aligned_old {
                Some(old_id) => Ok(DiffValue::reference(Reference::old(self.old_path(old_id)?))),
                None => Ok(DiffValue::reference(Reference::new_shared(self.shared_slot(id)))),
            };
        }

        self.in_progress.insert(id);
        let store = self.store;
        let node = store.get(id)?;
        let diff_value = self.copy_node(node)?;
        self.in_progress.remove(&id);

        let result = match aligned_old {
            Some(old_id) => {
                let old_path = self.old_path(old_id)?;
                self.record_changes(&old_path, store.get(old_id)?, node, &diff_value)?;
                DiffValue::reference(Reference::old(old_path))
            }
            None if self.multi_path.contains(&id) => {
                let slot = self.shared_slot(id);
                self.new_shared_values[slot] = Some(diff_value);
                DiffValue::reference(Reference::new_shared(slot))
            }
            None => return Ok(diff_value),
        };
        self.memo.insert(id, result.clone());
        Ok(result)
    }

    fn copy_node(&mut self, node: &Node) -> Result<DiffValue> {
        Ok(match node {
            Node::Record(record) => {
                let mut fields = IndexMap::with_capacity(record.len());
                for (name, child) in record.fields() {
                    fields.insert(name.to_string(), self.visit(child)?);
                }
                DiffValue::Record {
                    type_name: record.type_name().to_string(),
                    fields,
                }
            }
            Node::Sequence(items) => DiffValue::Sequence {
                items: items
                    .iter()
                    .map(|child| self.visit(child))
                    .collect::<Result<_>>()?,
            },
            Node::Mapping(entries) => {
                let mut copied = IndexMap::with_capacity(entries.len());
                for (key, child) in entries {
                    copied.insert(key.clone(), self.visit(child)?);
                }
                DiffValue::Mapping { entries: copied }
            }
            Node::Set(members) => DiffValue::Set {
                members: members.clone(),
            },
        })
    }

    fn shared_slot(&mut self, id: NodeId) -> usize {
        if let Some(&slot) = self.shared_slots.get(&id) {
            return slot;
        }
        let slot = self.new_shared_values.len();
        self.new_shared_values.push(None);
        self.shared_slots.insert(id, slot);
        slot
    }

    fn old_path(&self, old_id: NodeId) -> Result<Path> {
        self.old_paths
            .canonical_path(old_id)
            .cloned()
            .ok_or_else(|| DeltaError::BuilderInvariant {
                message: format!("aligned old node {} is not reachable from the old root", old_id),
            })
    }

    fn record_changes(
        &mut self,
        old_path: &Path,
        old_node: &Node,
        new_node: &Node,
        diff_value: &DiffValue,
    ) -> Result<()> {
        match (old_node, new_node, diff_value) {
            (Node::Record(old), Node::Record(new), DiffValue::Record { fields, .. }) => {
                if old.type_name() != new.type_name() {
                    self.changes.insert(
                        old_path.child(PathElement::TypeSelector),
                        DiffOperation::modify(Scalar::Str(new.type_name().to_string())),
                    );
                }
                for (name, old_child) in old.fields() {
                    let path = old_path.child(PathElement::attr(name));
                    match new.get(name) {
                        Some(new_child) if self.alignment.aligned_or_equal(old_child, new_child) => {}
                        Some(_) => {
                            self.changes
                                .insert(path, DiffOperation::modify(field_of(fields, name)?));
                        }
                        None => {
                            self.changes.insert(path, DiffOperation::DeleteValue);
                        }
                    }
                }
                for (name, _) in new.fields().filter(|(name, _)| !old.contains(name)) {
                    self.changes.insert(
                        old_path.child(PathElement::attr(name)),
                        DiffOperation::set(field_of(fields, name)?),
                    );
                }
            }
            (Node::Mapping(old), Node::Mapping(new), DiffValue::Mapping { entries }) => {
                for (key, old_child) in old {
                    let path = old_path.child(PathElement::Key(key.clone()));
                    match new.get(key) {
                        Some(new_child) if self.alignment.aligned_or_equal(old_child, new_child) => {}
                        Some(_) => {
                            let value = entries.get(key).cloned().ok_or_else(|| missing(&path))?;
                            self.changes.insert(path, DiffOperation::modify(value));
                        }
                        None => {
                            self.changes.insert(path, DiffOperation::DeleteValue);
                        }
                    }
                }
                for key in new.keys().filter(|key| !old.contains_key(*key)) {
                    let path = old_path.child(PathElement::Key(key.clone()));
                    let value = entries.get(key).cloned().ok_or_else(|| missing(&path))?;
                    self.changes.insert(path, DiffOperation::set(value));
                }
            }
            (Node::Sequence(old), Node::Sequence(new), DiffValue::Sequence { items }) => {
                for (index, (old_child, new_child)) in old.iter().zip(new.iter()).enumerate() {
                    if !self.alignment.aligned_or_equal(old_child, new_child) {
                        let path = old_path.child(PathElement::Index(index));
                        let value = items.get(index).cloned().ok_or_else(|| missing(&path))?;
                        self.changes.insert(path, DiffOperation::modify(value));
                    }
                }
            }
            // Aligned sets are equal
            (Node::Set(_), Node::Set(_), DiffValue::Set { .. }) => {}
            _ => {
                return Err(DeltaError::BuilderInvariant {
                    message: format!(
                        "aligned nodes at {:?} differ in kind ({} vs {})",
                        old_path.to_string(),
                        old_node.kind(),
                        new_node.kind()
                    ),
                })
            }
        }
        Ok(())
    }
}

fn field_of(fields: &IndexMap<String, DiffValue>, name: &str) -> Result<DiffValue> {
    fields.get(name).cloned().ok_or_else(|| DeltaError::BuilderInvariant {
        message: format!("diff value lost field {:?}", name),
    })
}

fn missing(path: &Path) -> DeltaError {
    DeltaError::BuilderInvariant {
        message: format!("diff value lost the child at {:?}", path.to_string()),
    }
}

/// Changes that turn `alignment.old_root()` into `alignment.new_root()`.
///
/// Aligned new nodes are expressed as in-place edits of their old
/// counterparts; everything else in new is copied into the diff.
///
/// # Errors
///
/// Returns `BuilderInvariant` if an aligned old node is unreachable from the
/// old root, `NodeNotFound` on dangling handles.
pub fn build_diff_from_alignment(alignment: &DiffAlignment<'_>) -> Result<Diff> {
    DiffBuilder::new(alignment)?.build_diff()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{align_by_id, align_heuristically};
    use crate::model::Key;

    #[test]
    fn test_build_twice_fails() {
        let mut store = NodeStore::new();
        let root = store.record("R", Vec::<(String, Value)>::new());
        let alignment = align_by_id(&store, &root, &root).unwrap();
        let mut builder = DiffBuilder::new(&alignment).unwrap();
        assert!(builder.build_diff().unwrap().is_empty());
        assert_eq!(builder.build_diff(), Err(DeltaError::DiffAlreadyBuilt));
        assert_eq!(
            DeltaError::DiffAlreadyBuilt.to_string(),
            "build_diff should be called at most once"
        );
    }

    #[test]
    fn test_record_changes() {
        let mut store = NodeStore::new();
        let old = store.record(
            "A",
            [("x", Value::from(5i64)), ("z", Value::from(2i64)), ("k", Value::from(1i64))],
        );
        let new = store.record("B", [("x", Value::from(5i64)), ("k", Value::from(9i64)), ("a", Value::from(3i64))]);
        let mut alignment = DiffAlignment::new(&store, old.clone(), new.clone());
        alignment.align(&old, &new).unwrap();

        let diff = build_diff_from_alignment(&alignment).unwrap();
        let rendered: Vec<String> = diff
            .changes
            .iter()
            .map(|(path, op)| format!("{}: {}", path, op))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ".a: SetValue(new_value=3)",
                ".k: ModifyValue(new_value=9)",
                ".z: DeleteValue()",
                ".__type__: ModifyValue(new_value=\"B\")",
            ]
        );
        assert!(diff.new_shared_values.is_empty());
    }

    #[test]
    fn test_nan_leaf_is_always_modified() {
        let mut store = NodeStore::new();
        let old = store.record("A", [("f", Value::from(f64::NAN)), ("g", Value::from(1.5))]);
        let new = store.record("A", [("f", Value::from(f64::NAN)), ("g", Value::from(1.5))]);
        let mut alignment = DiffAlignment::new(&store, old.clone(), new.clone());
        alignment.align(&old, &new).unwrap();

        let diff = build_diff_from_alignment(&alignment).unwrap();
        let paths: Vec<String> = diff.changes.keys().map(ToString::to_string).collect();
        assert_eq!(paths, vec![".f"]);
    }

    #[test]
    fn test_shared_new_value_becomes_shared_entry() {
        let mut store = NodeStore::new();
        let old = store.record("R", Vec::<(String, Value)>::new());
        let shared = store.sequence([Value::from(1i64)]);
        let new = store.record("R", [("a", shared.clone()), ("b", shared)]);

        let alignment = align_heuristically(&store, &old, &new).unwrap();
        let diff = build_diff_from_alignment(&alignment).unwrap();

        assert_eq!(diff.new_shared_values.len(), 1);
        let shared_ref = DiffValue::reference(Reference::new_shared(0));
        assert_eq!(
            diff.changes[&Path::root().attr("a")],
            DiffOperation::set(shared_ref.clone())
        );
        assert_eq!(diff.changes[&Path::root().attr("b")], DiffOperation::set(shared_ref));
    }

    #[test]
    fn test_aligned_child_becomes_old_reference() {
        let mut store = NodeStore::new();
        let child = store.mapping([(Key::from("k"), Value::from(1i64))]);
        let old = store.record("R", [("a", child.clone())]);
        let new = store.record("R", [("b", child)]);

        let alignment = align_by_id(&store, &old, &new).unwrap();
        let diff = build_diff_from_alignment(&alignment).unwrap();
        // The root is not aligned by identity, so nothing can be recorded.
        assert!(diff.changes.is_empty());

        let alignment = align_heuristically(&store, &old, &new).unwrap();
        let diff = build_diff_from_alignment(&alignment).unwrap();
        assert_eq!(
            diff.changes[&Path::root().attr("b")],
            DiffOperation::set(Reference::old(Path::root().attr("a")))
        );
        assert_eq!(diff.changes[&Path::root().attr("a")], DiffOperation::DeleteValue);
    }

    #[test]
    fn test_new_cycle_reserves_shared_slot() {
        let mut store = NodeStore::new();
        let old = store.record("R", Vec::<(String, Value)>::new());
        let node = store.record("Loop", Vec::<(String, Value)>::new());
        store
            .set_field(node.node_id().unwrap(), "me", node.clone())
            .unwrap();
        let new = store.record("R", [("loop", node)]);

        let alignment = align_heuristically(&store, &old, &new).unwrap();
        let diff = build_diff_from_alignment(&alignment).unwrap();
        assert_eq!(diff.new_shared_values.len(), 1);
        assert_eq!(
            diff.new_shared_values[0],
            DiffValue::record(
                "Loop",
                [("me", DiffValue::reference(Reference::new_shared(0)))]
            )
        );
    }
}
