//! In-place application of diffs
//!
//! ## Atomicity Contract
//!
//! - **All-or-nothing**: work happens on a copy of the store that replaces
//!   the caller's store only when every change succeeded
//! - **Aggregate errors**: every failing change is reported, sorted by path
//! - **Pre-resolved parents**: parent paths are looked up before any
//!   mutation, so swaps of siblings or of a parent with its child work
//!
//! Within one parent, deletes run first, then the type change, then every
//! set and modify. Deleting a field the new type refuses therefore always
//! precedes the type change.

use std::collections::BTreeMap;

use crate::diff::model::{Diff, OperationKind, ResolvedDiff, ResolvedOperation};
use crate::errors::{ApplyError, ApplyFailure, ApplyFailureKind, DeltaError, Result};
use crate::model::{Node, NodeId, NodeKind, NodeStore, Value};
use crate::path::{follow_path, Path, PathElement};
use crate::resolve::resolve_diff_references;

/// Resolve `diff` against `old_root` and apply it to the old tree.
///
/// # Errors
///
/// Returns resolution errors unchanged and `DeltaError::Apply` listing every
/// change that could not be applied. On error the store is untouched.
pub fn apply_diff(diff: &Diff, store: &mut NodeStore, old_root: &Value) -> Result<()> {
    let mut work = store.clone();
    let resolved = resolve_diff_references(diff, &mut work, old_root)?;
    apply_changes(&resolved, &mut work, old_root, |path| {
        diff.changes
            .get(path)
            .map(ToString::to_string)
            .unwrap_or_default()
    })?;
    *store = work;
    Ok(())
}

/// Apply an already resolved diff to the old tree.
///
/// # Errors
///
/// Returns `DeltaError::Apply` listing every change that could not be
/// applied. On error the store is untouched.
pub fn apply_resolved_diff(resolved: &ResolvedDiff, store: &mut NodeStore, old_root: &Value) -> Result<()> {
    let mut work = store.clone();
    apply_changes(resolved, &mut work, old_root, |path| {
        resolved
            .changes
            .get(path)
            .map(ToString::to_string)
            .unwrap_or_default()
    })?;
    *store = work;
    Ok(())
}

struct Change<'d> {
    path: &'d Path,
    element: &'d PathElement,
    op: &'d ResolvedOperation,
}

impl Change<'_> {
    /// 0 = delete, 1 = type change, 2 = set/modify
    fn phase(&self) -> u8 {
        match (self.op.kind(), self.element) {
            (OperationKind::DeleteValue, _) => 0,
            (_, PathElement::TypeSelector) => 1,
            _ => 2,
        }
    }
}

struct Failures<F> {
    failures: Vec<ApplyFailure>,
    render: F,
}

impl<F: Fn(&Path) -> String> Failures<F> {
    fn push(&mut self, path: &Path, kind: ApplyFailureKind, message: impl Into<String>) {
        self.failures.push(ApplyFailure {
            path: path.clone(),
            operation: (self.render)(path),
            kind,
            message: message.into(),
        });
    }
}

fn apply_changes<F>(resolved: &ResolvedDiff, store: &mut NodeStore, old_root: &Value, render: F) -> Result<()>
where
    F: Fn(&Path) -> String,
{
    let mut failures = Failures {
        failures: Vec::new(),
        render,
    };

    let mut by_parent: BTreeMap<Path, Vec<Change<'_>>> = BTreeMap::new();
    for (path, op) in &resolved.changes {
        match (path.parent(), path.last()) {
            (Some(parent), Some(element)) => {
                by_parent
                    .entry(parent)
                    .or_default()
                    .push(Change { path, element, op });
            }
            _ => failures.push(
                path,
                ApplyFailureKind::RootTarget,
                "Modifying the root object is not supported",
            ),
        }
    }

    // Every parent is looked up and every change validated before mutating
    let mut plan: Vec<(NodeId, Vec<Change<'_>>)> = Vec::with_capacity(by_parent.len());
    for (parent_path, changes) in by_parent {
        let parent = match follow_path(store, old_root, &parent_path) {
            Ok(Value::Node(id)) => id,
            Ok(Value::Leaf(scalar)) => {
                for change in &changes {
                    failures.push(
                        change.path,
                        ApplyFailureKind::ParentWrongKind,
                        format!("parent has unexpected type: {}", scalar.kind_name()),
                    );
                }
                continue;
            }
            Err(_) => {
                for change in &changes {
                    failures.push(change.path, ApplyFailureKind::ParentMissing, "parent does not exist");
                }
                continue;
            }
        };
        let node = store.get(parent)?;
        for change in &changes {
            if let Err((kind, message)) = validate(node, change) {
                failures.push(change.path, kind, message);
            }
        }
        plan.push((parent, changes));
    }
    if !failures.failures.is_empty() {
        return Err(ApplyError::new(failures.failures).into());
    }

    for (parent, mut changes) in plan {
        changes.sort_by_key(Change::phase);
        for change in &changes {
            if let Err(err) = mutate(store, parent, change) {
                let kind = match err {
                    DeltaError::FieldRejected { .. } | DeltaError::TypeRejected { .. } => {
                        ApplyFailureKind::Rejected
                    }
                    _ => ApplyFailureKind::ParentWrongKind,
                };
                failures.push(change.path, kind, err.to_string());
            }
        }
    }
    if !failures.failures.is_empty() {
        return Err(ApplyError::new(failures.failures).into());
    }

    tracing::debug!(change_count = resolved.changes.len(), "diff applied");
    Ok(())
}

fn validate(parent: &Node, change: &Change<'_>) -> std::result::Result<(), (ApplyFailureKind, String)> {
    let kind = change.op.kind();
    let expected = match change.element {
        PathElement::Attribute(_) | PathElement::TypeSelector => NodeKind::Record,
        PathElement::Index(_) => NodeKind::Sequence,
        PathElement::Key(_) => NodeKind::Mapping,
    };
    if parent.kind() != expected {
        return Err((
            ApplyFailureKind::ParentWrongKind,
            format!(
                "parent has unexpected type: {} cannot be addressed on a {}",
                change.element,
                parent.kind()
            ),
        ));
    }

    let has_value = match (parent, change.element) {
        (Node::Record(record), PathElement::Attribute(name)) => record.contains(name),
        (Node::Sequence(items), PathElement::Index(index)) => *index < items.len(),
        (Node::Mapping(entries), PathElement::Key(key)) => entries.contains_key(key),
        _ => true,
    };

    match (change.element, kind) {
        (PathElement::TypeSelector, OperationKind::ModifyValue) => {
            let is_name = change
                .op
                .new_value()
                .and_then(Value::as_leaf)
                .and_then(|scalar| scalar.as_str())
                .is_some();
            if is_name {
                Ok(())
            } else {
                Err((
                    ApplyFailureKind::UnsupportedPathElement,
                    "a record type must be modified to a type name string".to_string(),
                ))
            }
        }
        (PathElement::TypeSelector, _) => Err((
            ApplyFailureKind::UnsupportedPathElement,
            format!("{} does not support TypeSelector", kind.name()),
        )),
        (PathElement::Index(_), OperationKind::SetValue | OperationKind::DeleteValue) => Err((
            ApplyFailureKind::IndexUnsupported,
            format!("{} does not support Index", kind.name()),
        )),
        (_, OperationKind::SetValue) if has_value => Err((
            ApplyFailureKind::ValueAlreadyPresent,
            "already has a value; use ModifyValue to overwrite".to_string(),
        )),
        (_, OperationKind::ModifyValue) if !has_value => Err((
            ApplyFailureKind::ValueAbsent,
            "value not found; use SetValue to add a new value".to_string(),
        )),
        (_, OperationKind::DeleteValue) if !has_value => {
            Err((ApplyFailureKind::ValueAbsent, "value not found.".to_string()))
        }
        _ => Ok(()),
    }
}

fn mutate(store: &mut NodeStore, parent: NodeId, change: &Change<'_>) -> Result<()> {
    let value = change.op.new_value().cloned();
    match (change.element, value) {
        (PathElement::Attribute(name), None) => store.delete_field(parent, name).map(drop),
        (PathElement::Key(key), None) => store.delete_entry(parent, key).map(drop),
        (PathElement::TypeSelector, Some(Value::Leaf(scalar))) => {
            let type_name = scalar.as_str().unwrap_or_default().to_string();
            store.set_type_name(parent, &type_name)
        }
        (PathElement::Attribute(name), Some(value)) => store.set_field(parent, name, value).map(drop),
        (PathElement::Index(index), Some(value)) => store.set_item(parent, *index, value).map(drop),
        (PathElement::Key(key), Some(value)) => store.set_entry(parent, key.clone(), value).map(drop),
        (element, _) => Err(DeltaError::PathKindMismatch {
            element: element.to_string(),
            found: store.get(parent)?.kind().to_string(),
        }),
    }
}
