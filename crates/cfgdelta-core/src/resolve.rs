//! Reference resolution.
//!
//! Turns the symbolic operands of a [`Diff`] into concrete store values.
//! Container-valued shared values are allocated first as placeholders and
//! filled afterwards, so shared values may refer to each other in any order
//! and may form cycles. References into a shared value with a trailing path
//! (`new_shared_values[0].x`) are patched once every placeholder is filled.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::diff::model::{
    Diff, DiffOperation, DiffValue, Reference, ResolvedDiff, ResolvedOperation,
    NEW_SHARED_VALUES_ROOT, OLD_ROOT,
};
use crate::errors::{DeltaError, Result};
use crate::model::{Node, NodeId, NodeStore, Record, Scalar, Value};
use crate::path::{follow_path, Path, PathElement};
use crate::traversal::Reachable;

#[derive(Debug, Clone)]
enum Slot {
    Leaf(Scalar),
    Placeholder(NodeId),
    Alias(Reference),
}

#[derive(Debug, Clone)]
enum FixupTarget {
    Child(NodeId, PathElement),
    Change(Path),
}

#[derive(Debug, Clone)]
struct Fixup {
    target: FixupTarget,
    reference: Reference,
}

struct Resolver<'a> {
    old_root: &'a Value,
    slots: Vec<Slot>,
    placeholders: HashSet<NodeId>,
    late: bool,
}

impl<'a> Resolver<'a> {
    fn invalid(reference: &Reference, reason: impl Into<String>) -> DeltaError {
        DeltaError::InvalidReferenceTarget {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// `Ok(None)` means the reference must wait for the placeholders to fill
    fn resolve(
        &self,
        store: &NodeStore,
        reference: &Reference,
        visiting: &mut Vec<usize>,
    ) -> Result<Option<Value>> {
        match reference.root.as_str() {
            OLD_ROOT => follow_path(store, self.old_root, &reference.target)
                .map(Some)
                .map_err(|e| Self::invalid(reference, e.to_string())),
            NEW_SHARED_VALUES_ROOT => {
                let (index, rest) = reference
                    .shared_target()
                    .ok_or_else(|| Self::invalid(reference, "target must start with an index"))?;
                let slot = self.slots.get(index).ok_or_else(|| {
                    Self::invalid(
                        reference,
                        format!("only {} new shared values exist", self.slots.len()),
                    )
                })?;
                let base = match slot {
                    Slot::Leaf(scalar) => Value::Leaf(scalar.clone()),
                    Slot::Placeholder(id) => Value::Node(*id),
                    Slot::Alias(alias) => {
                        if visiting.contains(&index) {
                            return Err(Self::invalid(
                                reference,
                                "new shared values refer to each other without reaching a value",
                            ));
                        }
                        visiting.push(index);
                        let resolved = self.resolve(store, alias, visiting)?;
                        visiting.pop();
                        match resolved {
                            Some(value) => value,
                            None => return Ok(None),
                        }
                    }
                };
                if rest.is_root() {
                    return Ok(Some(base));
                }
                let in_placeholder = base.node_id().is_some_and(|id| self.placeholders.contains(&id));
                if in_placeholder && !self.late {
                    return Ok(None);
                }
                follow_path(store, &base, &rest)
                    .map(Some)
                    .map_err(|e| Self::invalid(reference, e.to_string()))
            }
            other => Err(DeltaError::UnknownReferenceRoot {
                root: other.to_string(),
            }),
        }
    }

    fn materialize(
        &self,
        store: &mut NodeStore,
        value: &DiffValue,
        target: FixupTarget,
        fixups: &mut Vec<Fixup>,
    ) -> Result<Value> {
        match value {
            DiffValue::Leaf { value } => Ok(Value::Leaf(value.clone())),
            DiffValue::Reference { reference } => {
                match self.resolve(store, reference, &mut Vec::new())? {
                    Some(resolved) => Ok(resolved),
                    None => {
                        fixups.push(Fixup {
                            target,
                            reference: reference.clone(),
                        });
                        Ok(Value::null())
                    }
                }
            }
            container => {
                let id = store.insert(Node::Sequence(Vec::new()));
                self.fill(store, id, container, fixups)?;
                Ok(Value::Node(id))
            }
        }
    }

    /// Build the node for a container diff value under an existing handle
    fn fill(
        &self,
        store: &mut NodeStore,
        id: NodeId,
        value: &DiffValue,
        fixups: &mut Vec<Fixup>,
    ) -> Result<()> {
        let node = match value {
            DiffValue::Record { type_name, fields } => {
                let mut record = Record::new(type_name.clone());
                for (name, child) in fields {
                    let target = FixupTarget::Child(id, PathElement::attr(name.clone()));
                    record.insert(name.clone(), self.materialize(store, child, target, fixups)?);
                }
                Node::Record(record)
            }
            DiffValue::Sequence { items } => {
                let mut values = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    let target = FixupTarget::Child(id, PathElement::Index(index));
                    values.push(self.materialize(store, child, target, fixups)?);
                }
                Node::Sequence(values)
            }
            DiffValue::Mapping { entries } => {
                let mut values = IndexMap::with_capacity(entries.len());
                for (key, child) in entries {
                    let target = FixupTarget::Child(id, PathElement::Key(key.clone()));
                    values.insert(key.clone(), self.materialize(store, child, target, fixups)?);
                }
                Node::Mapping(values)
            }
            DiffValue::Set { members } => Node::Set(members.clone()),
            DiffValue::Leaf { .. } | DiffValue::Reference { .. } => {
                return Err(DeltaError::BuilderInvariant {
                    message: "only container values are materialized into placeholders".to_string(),
                })
            }
        };
        store.replace(id, node)?;
        Ok(())
    }
}

fn write_child(
    store: &mut NodeStore,
    id: NodeId,
    element: &PathElement,
    reference: &Reference,
    value: Value,
) -> Result<()> {
    match (store.get_mut(id)?, element) {
        (Node::Record(record), PathElement::Attribute(name)) => {
            record.insert(name.clone(), value);
        }
        (Node::Sequence(items), PathElement::Index(index)) => {
            let len = items.len();
            let slot = items.get_mut(*index).ok_or_else(|| {
                Resolver::invalid(
                    reference,
                    format!("index {} is out of range for a sequence of {} items", index, len),
                )
            })?;
            *slot = value;
        }
        (Node::Mapping(entries), PathElement::Key(key)) => {
            entries.insert(key.clone(), value);
        }
        (node, element) => {
            return Err(DeltaError::BuilderInvariant {
                message: format!("cannot patch {} on a {}", element, node.kind()),
            })
        }
    }
    Ok(())
}

/// Replace every reference in `diff` with a concrete value.
///
/// `old` references are followed in the tree under `old_root` as it is now;
/// containers in the diff are allocated in `store`. The old tree itself is
/// not mutated.
///
/// # Errors
///
/// Returns `UnknownReferenceRoot` for a root other than `old` or
/// `new_shared_values`, and `InvalidReferenceTarget` for a target that does
/// not resolve or a chain of shared values that never reaches a value.
pub fn resolve_diff_references(diff: &Diff, store: &mut NodeStore, old_root: &Value) -> Result<ResolvedDiff> {
    // Phase 1: one handle per container shared value
    let mut slots = Vec::with_capacity(diff.new_shared_values.len());
    let mut placeholders = HashSet::new();
    for value in &diff.new_shared_values {
        slots.push(match value {
            DiffValue::Leaf { value } => Slot::Leaf(value.clone()),
            DiffValue::Reference { reference } => Slot::Alias(reference.clone()),
            _ => {
                let id = store.insert(Node::Sequence(Vec::new()));
                placeholders.insert(id);
                Slot::Placeholder(id)
            }
        });
    }
    let mut resolver = Resolver {
        old_root,
        slots,
        placeholders,
        late: false,
    };

    // Phase 2: fill placeholders and resolve change operands
    let mut fixups = Vec::new();
    for (value, slot) in diff.new_shared_values.iter().zip(resolver.slots.iter()) {
        if let Slot::Placeholder(id) = slot {
            resolver.fill(store, *id, value, &mut fixups)?;
        }
    }
    let mut changes = BTreeMap::new();
    for (path, op) in &diff.changes {
        let target = FixupTarget::Change(path.clone());
        let resolved = match op {
            DiffOperation::DeleteValue => ResolvedOperation::DeleteValue,
            DiffOperation::SetValue { new_value } => ResolvedOperation::SetValue(
                resolver.materialize(store, new_value, target, &mut fixups)?,
            ),
            DiffOperation::ModifyValue { new_value } => ResolvedOperation::ModifyValue(
                resolver.materialize(store, new_value, target, &mut fixups)?,
            ),
        };
        changes.insert(path.clone(), resolved);
    }

    // Suffix references into shared values, now that every placeholder is filled
    resolver.late = true;
    for fixup in fixups {
        let value = resolver
            .resolve(store, &fixup.reference, &mut Vec::new())?
            .ok_or_else(|| Resolver::invalid(&fixup.reference, "unresolvable"))?;
        match fixup.target {
            FixupTarget::Child(id, element) => {
                write_child(store, id, &element, &fixup.reference, value)?
            }
            FixupTarget::Change(path) => {
                if let Some(op) = changes.get_mut(&path) {
                    *op = match op {
                        ResolvedOperation::SetValue(_) => ResolvedOperation::SetValue(value),
                        ResolvedOperation::ModifyValue(_) => ResolvedOperation::ModifyValue(value),
                        ResolvedOperation::DeleteValue => ResolvedOperation::DeleteValue,
                    };
                }
            }
        }
    }

    let mut new_shared_values = Vec::with_capacity(resolver.slots.len());
    for (index, slot) in resolver.slots.iter().enumerate() {
        new_shared_values.push(match slot {
            Slot::Leaf(scalar) => Value::Leaf(scalar.clone()),
            Slot::Placeholder(id) => Value::Node(*id),
            Slot::Alias(_) => resolver
                .resolve(store, &Reference::new_shared(index), &mut Vec::new())?
                .ok_or_else(|| Resolver::invalid(&Reference::new_shared(index), "unresolvable"))?,
        });
    }

    tracing::debug!(
        change_count = changes.len(),
        shared_count = new_shared_values.len(),
        "diff references resolved"
    );
    Ok(ResolvedDiff {
        changes,
        new_shared_values,
    })
}

/// Express a resolved diff symbolically again.
///
/// Handles of resolved shared values become `new_shared_values[i]`
/// references, nodes reachable from `old_root` become `old` references at
/// their canonical path, and any other node is copied inline.
///
/// # Errors
///
/// Returns `InvalidReferenceTarget` if an inline node is part of a cycle
/// that does not pass through a shared value.
pub fn unresolve(resolved: &ResolvedDiff, store: &NodeStore, old_root: &Value) -> Result<Diff> {
    let old_paths = Reachable::walk(store, old_root)?;
    let mut shared_index: HashMap<NodeId, usize> = HashMap::new();
    for (index, value) in resolved.new_shared_values.iter().enumerate() {
        if let Value::Node(id) = value {
            if !old_paths.contains(*id) {
                shared_index.entry(*id).or_insert(index);
            }
        }
    }
    let symbolic = Symbolizer {
        store,
        old_paths: &old_paths,
        shared_index: &shared_index,
    };

    let mut new_shared_values = Vec::with_capacity(resolved.new_shared_values.len());
    for value in &resolved.new_shared_values {
        new_shared_values.push(match value {
            Value::Node(id) if shared_index.contains_key(id) => {
                symbolic.expand(*id, &mut HashSet::new())?
            }
            other => symbolic.value(other, &mut HashSet::new())?,
        });
    }
    let mut changes = BTreeMap::new();
    for (path, op) in &resolved.changes {
        let symbolic_op = match op {
            ResolvedOperation::SetValue(value) => {
                DiffOperation::set(symbolic.value(value, &mut HashSet::new())?)
            }
            ResolvedOperation::ModifyValue(value) => {
                DiffOperation::modify(symbolic.value(value, &mut HashSet::new())?)
            }
            ResolvedOperation::DeleteValue => DiffOperation::DeleteValue,
        };
        changes.insert(path.clone(), symbolic_op);
    }
    Ok(Diff::new(changes, new_shared_values))
}

struct Symbolizer<'a> {
    store: &'a NodeStore,
    old_paths: &'a Reachable,
    shared_index: &'a HashMap<NodeId, usize>,
}

impl Symbolizer<'_> {
    fn value(&self, value: &Value, expanding: &mut HashSet<NodeId>) -> Result<DiffValue> {
        match value {
            Value::Leaf(scalar) => Ok(DiffValue::leaf(scalar.clone())),
            Value::Node(id) => {
                if let Some(&index) = self.shared_index.get(id) {
                    return Ok(DiffValue::reference(Reference::new_shared(index)));
                }
                if let Some(path) = self.old_paths.canonical_path(*id) {
                    return Ok(DiffValue::reference(Reference::old(path.clone())));
                }
                self.expand(*id, expanding)
            }
        }
    }

    fn expand(&self, id: NodeId, expanding: &mut HashSet<NodeId>) -> Result<DiffValue> {
        if !expanding.insert(id) {
            return Err(DeltaError::InvalidReferenceTarget {
                reference: format!("<node {}>", id),
                reason: "cyclic value is not a shared value".to_string(),
            });
        }
        let expanded = match self.store.get(id)? {
            Node::Record(record) => {
                let mut fields = IndexMap::with_capacity(record.len());
                for (name, child) in record.fields() {
                    fields.insert(name.to_string(), self.value(child, expanding)?);
                }
                DiffValue::Record {
                    type_name: record.type_name().to_string(),
                    fields,
                }
            }
            Node::Sequence(items) => DiffValue::Sequence {
                items: items
                    .iter()
                    .map(|child| self.value(child, expanding))
                    .collect::<Result<_>>()?,
            },
            Node::Mapping(entries) => {
                let mut copied = IndexMap::with_capacity(entries.len());
                for (key, child) in entries {
                    copied.insert(key.clone(), self.value(child, expanding)?);
                }
                DiffValue::Mapping { entries: copied }
            }
            Node::Set(members) => DiffValue::Set {
                members: members.clone(),
            },
        };
        expanding.remove(&id);
        Ok(expanded)
    }
}
