//! Partial one-to-one mapping between the nodes of two trees

pub mod heuristics;

use std::collections::HashMap;
use std::fmt;

use crate::errors::{DeltaError, Result, Side};
use crate::model::{Node, NodeId, NodeStore, Value};
use crate::traversal::{structurally_equal, Reachable};

pub use heuristics::{align_by_id, align_heuristically, align_with_passes, AlignmentPasses};

/// One aligned pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignedValues {
    pub old_value: NodeId,
    pub new_value: NodeId,
}

/// Alignment between an old and a new tree in one store.
///
/// Entries can only be added. Every entry pairs memoizable nodes of the same
/// kind; sequences must have equal length and sets must be equal. Aligning a
/// node with something that contains its own counterpart's ancestor (an
/// alignment cycle) is not detected and is the caller's responsibility.
pub struct DiffAlignment<'s> {
    store: &'s NodeStore,
    old_root: Value,
    new_root: Value,
    old_name: String,
    new_name: String,
    new_by_old: HashMap<NodeId, NodeId>,
    old_by_new: HashMap<NodeId, NodeId>,
    pairs: Vec<AlignedValues>,
}

impl<'s> DiffAlignment<'s> {
    pub fn new(store: &'s NodeStore, old_root: Value, new_root: Value) -> Self {
        Self {
            store,
            old_root,
            new_root,
            old_name: "old".to_string(),
            new_name: "new".to_string(),
            new_by_old: HashMap::new(),
            old_by_new: HashMap::new(),
            pairs: Vec::new(),
        }
    }

    /// Labels used when listing aligned paths
    pub fn with_names(mut self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.old_name = old_name.into();
        self.new_name = new_name.into();
        self
    }

    pub fn store(&self) -> &'s NodeStore {
        self.store
    }

    pub fn old_root(&self) -> &Value {
        &self.old_root
    }

    pub fn new_root(&self) -> &Value {
        &self.new_root
    }

    pub fn old_name(&self) -> &str {
        &self.old_name
    }

    pub fn new_name(&self) -> &str {
        &self.new_name
    }

    /// Non-failing form of [`align`](Self::align)
    pub fn can_align(&self, old_value: &Value, new_value: &Value) -> bool {
        self.check(old_value, new_value).is_ok()
    }

    /// Record that `old_value` became `new_value`
    ///
    /// # Errors
    ///
    /// Returns `NotMemoizable`, `AlreadyAligned`, `KindMismatch`,
    /// `LengthMismatch` or `UnequalValues`, checked in that order.
    pub fn align(&mut self, old_value: &Value, new_value: &Value) -> Result<()> {
        let (old_id, new_id) = self.check(old_value, new_value)?;
        self.new_by_old.insert(old_id, new_id);
        self.old_by_new.insert(new_id, old_id);
        self.pairs.push(AlignedValues {
            old_value: old_id,
            new_value: new_id,
        });
        tracing::trace!(old = %old_id, new = %new_id, "aligned");
        Ok(())
    }

    fn check(&self, old_value: &Value, new_value: &Value) -> Result<(NodeId, NodeId)> {
        let old_id = old_value.node_id().ok_or_else(|| DeltaError::NotMemoizable {
            side: Side::Old,
            value: old_value.to_string(),
        })?;
        let new_id = new_value.node_id().ok_or_else(|| DeltaError::NotMemoizable {
            side: Side::New,
            value: new_value.to_string(),
        })?;
        if self.new_by_old.contains_key(&old_id) {
            return Err(DeltaError::AlreadyAligned {
                side: Side::Old,
                node_id: old_id,
            });
        }
        if self.old_by_new.contains_key(&new_id) {
            return Err(DeltaError::AlreadyAligned {
                side: Side::New,
                node_id: new_id,
            });
        }

        let old_node = self.store.get(old_id)?;
        let new_node = self.store.get(new_id)?;
        if old_node.kind() != new_node.kind() {
            return Err(DeltaError::KindMismatch {
                old: old_node.kind(),
                new: new_node.kind(),
            });
        }
        match (old_node, new_node) {
            (Node::Sequence(old_items), Node::Sequence(new_items))
                if old_items.len() != new_items.len() =>
            {
                Err(DeltaError::LengthMismatch {
                    old_len: old_items.len(),
                    new_len: new_items.len(),
                })
            }
            (Node::Set(_), Node::Set(_))
                if !structurally_equal(self.store, old_value, new_value) =>
            {
                Err(DeltaError::UnequalValues {
                    kind: old_node.kind(),
                    old: old_id,
                    new: new_id,
                })
            }
            _ => Ok((old_id, new_id)),
        }
    }

    pub fn is_old_aligned(&self, old_value: &Value) -> bool {
        old_value
            .node_id()
            .is_some_and(|id| self.new_by_old.contains_key(&id))
    }

    pub fn is_new_aligned(&self, new_value: &Value) -> bool {
        new_value
            .node_id()
            .is_some_and(|id| self.old_by_new.contains_key(&id))
    }

    pub fn new_from_old(&self, old_value: &Value) -> Option<NodeId> {
        old_value
            .node_id()
            .and_then(|id| self.new_by_old.get(&id).copied())
    }

    pub fn old_from_new(&self, new_value: &Value) -> Option<NodeId> {
        new_value
            .node_id()
            .and_then(|id| self.old_by_new.get(&id).copied())
    }

    /// Aligned pairs in insertion order
    pub fn aligned_values(&self) -> &[AlignedValues] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True if the two values are mutually aligned, or are equal leaves
    pub fn aligned_or_equal(&self, old_value: &Value, new_value: &Value) -> bool {
        match (old_value, new_value) {
            (Value::Leaf(a), Value::Leaf(b)) => a.same_as(b),
            (Value::Node(old_id), Value::Node(new_id)) => {
                self.new_by_old.get(old_id) == Some(new_id)
            }
            _ => false,
        }
    }
}

impl fmt::Display for DiffAlignment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pairs.is_empty() {
            return write!(f, "DiffAlignment(no objects aligned)");
        }
        let old_paths = Reachable::walk(self.store, &self.old_root).unwrap_or_default();
        let new_paths = Reachable::walk(self.store, &self.new_root).unwrap_or_default();
        let render = |name: &str, reachable: &Reachable, id: NodeId| match reachable.canonical_path(id) {
            Some(path) => format!("{}{}", name, path),
            None => format!("{}<unreachable {}>", name, id),
        };

        write!(f, "DiffAlignment:")?;
        for pair in &self.pairs {
            write!(
                f,
                "\n    {} -> {}",
                render(&self.old_name, &old_paths, pair.old_value),
                render(&self.new_name, &new_paths, pair.new_value)
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for DiffAlignment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<DiffAlignment from {:?} to {:?}: {} object(s) aligned>",
            self.old_name,
            self.new_name,
            self.pairs.len()
        )
    }
}
