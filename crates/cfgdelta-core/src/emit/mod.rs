//! Statement emission.
//!
//! Lowers a [`Diff`] to an ordered list of abstract [`Statement`]s that a
//! code generator can print in any target language. Running the statements
//! in order against the old tree reproduces what [`crate::apply::apply_diff`]
//! does:
//!
//! 1. every new shared value is bound, in index order
//! 2. every input path that a later mutation could detach is bound to an
//!    alias while the tree is still untouched
//! 3. changes run grouped by parent: deletes, then the type change, then
//!    every assignment

pub mod namespace;
pub mod statement;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::diff::model::{
    Diff, DiffOperation, DiffValue, Reference, ResolvedDiff, NEW_SHARED_VALUES_ROOT, OLD_ROOT,
};
use crate::errors::{DeltaError, Result};
use crate::model::{NodeStore, Value};
use crate::path::{follow_path, Path, PathElement};
use crate::resolve::unresolve;
use crate::traversal::paths_by_node;

pub use namespace::{camel_to_snake, path_to_name, Namespace};
pub use statement::{Expr, Statement};

/// Default name of the variable holding the old tree
pub const DEFAULT_ROOT_NAME: &str = "cfg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Variable the statements mutate
    pub root_name: String,
    /// Identifiers never handed out to aliases or shared bindings
    pub reserved: Vec<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            reserved: Vec::new(),
        }
    }
}

impl EmitOptions {
    pub fn with_root_name(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = root_name.into();
        self
    }

    pub fn with_reserved<I, S>(mut self, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(reserved.into_iter().map(Into::into));
        self
    }
}

/// Emit the statements that turn the old tree into the new one.
///
/// With `old` given, only paths that a mutation can actually detach are
/// aliased. Without it every path the statements read is aliased.
///
/// # Errors
///
/// - `UnsupportedChange` for a change at the root, a type change to a
///   non-string value, setting or deleting a type, or setting or deleting
///   a sequence item
/// - `ForwardSharedReference` when a shared value refers to itself or to a
///   shared value bound after it
/// - `UnknownReferenceRoot` for references outside `old`/`new_shared_values`
/// - `NodeNotFound` if `old` contains a dangling handle
pub fn emit_statements(
    diff: &Diff,
    store: &NodeStore,
    old: Option<&Value>,
    options: &EmitOptions,
) -> Result<Vec<Statement>> {
    let plan = Plan::new(diff, store, old, options)?;
    let mut statements = Vec::with_capacity(
        diff.new_shared_values.len() + plan.aliases.len() + diff.changes.len(),
    );

    for (index, value) in diff.new_shared_values.iter().enumerate() {
        statements.push(Statement::BindShared {
            name: plan.shared_names[index].clone(),
            index,
            value: plan.expr(value, Some(index))?,
        });
    }

    for (path, name) in plan.aliases_in_order() {
        statements.push(Statement::BindAlias {
            name: name.clone(),
            path: path.clone(),
            value: Expr::path(plan.root_var(), path),
        });
    }

    for (parent, changes) in plan.groups(diff) {
        let parent_expr = plan.parent_expr(&parent);
        let mut deletes = Vec::new();
        let mut type_change = None;
        let mut assigns = Vec::new();
        for (path, element, op) in changes {
            match (op, element) {
                (DiffOperation::DeleteValue, PathElement::TypeSelector) => {
                    return Err(unsupported(path, "the type of a record cannot be deleted"));
                }
                (DiffOperation::DeleteValue, PathElement::Index(_)) => {
                    return Err(unsupported(path, "DeleteValue does not support Index"));
                }
                (DiffOperation::DeleteValue, _) => deletes.push(Statement::Delete {
                    target: parent_expr.clone().child(element.clone()),
                }),
                (DiffOperation::SetValue { .. }, PathElement::TypeSelector) => {
                    return Err(unsupported(path, "SetValue does not support TypeSelector"));
                }
                (DiffOperation::ModifyValue { new_value }, PathElement::TypeSelector) => {
                    let type_name = match new_value {
                        DiffValue::Leaf { value } => value.as_str().map(str::to_string),
                        _ => None,
                    }
                    .ok_or_else(|| unsupported(path, "a type name must be a string"))?;
                    type_change = Some(Statement::UpdateType {
                        target: parent_expr.clone(),
                        type_name,
                    });
                }
                (DiffOperation::SetValue { .. }, PathElement::Index(_)) => {
                    return Err(unsupported(path, "SetValue does not support Index"));
                }
                (DiffOperation::SetValue { new_value } | DiffOperation::ModifyValue { new_value }, _) => {
                    assigns.push(Statement::Assign {
                        target: parent_expr.clone().child(element.clone()),
                        value: plan.expr(new_value, None)?,
                    });
                }
            }
        }
        statements.extend(deletes);
        statements.extend(type_change);
        statements.extend(assigns);
    }

    tracing::debug!(
        statements = statements.len(),
        aliases = plan.aliases.len(),
        shared = diff.new_shared_values.len(),
        "emitted statements"
    );
    Ok(statements)
}

/// Emit statements for a diff whose references were already resolved.
///
/// # Errors
///
/// Same as [`emit_statements`], plus errors from turning the resolved values
/// back into references.
pub fn emit_resolved_statements(
    resolved: &ResolvedDiff,
    store: &NodeStore,
    old: &Value,
    options: &EmitOptions,
) -> Result<Vec<Statement>> {
    let diff = unresolve(resolved, store, old)?;
    emit_statements(&diff, store, Some(old), options)
}

fn unsupported(path: &Path, reason: &str) -> DeltaError {
    DeltaError::UnsupportedChange {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

type Group<'d> = Vec<(&'d Path, &'d PathElement, &'d DiffOperation)>;

struct Plan {
    root_name: String,
    aliases: HashMap<Path, String>,
    shared_names: Vec<String>,
}

impl Plan {
    fn new(diff: &Diff, store: &NodeStore, old: Option<&Value>, options: &EmitOptions) -> Result<Self> {
        if let Some(path) = diff.changes.keys().find(|path| path.is_root()) {
            return Err(unsupported(path, "Changing the root object is not supported"));
        }

        let mut used: BTreeSet<Path> = diff.changes.keys().filter_map(Path::parent).collect();
        let operands = diff
            .changes
            .values()
            .filter_map(DiffOperation::new_value)
            .chain(&diff.new_shared_values);
        for operand in operands {
            for reference in operand.references() {
                if reference.is_old() {
                    used.insert(reference.target.clone());
                }
            }
        }

        let (prefix, aliased): (String, Vec<Path>) = match old {
            Some(old) => {
                let modified = modified_paths(diff, store, old)?;
                let aliased = used
                    .into_iter()
                    .filter(|path| path.prefixes().any(|prefix| modified.contains(&prefix)))
                    .collect();
                (format!("moved_{}_", options.root_name), aliased)
            }
            None => (format!("original_{}_", options.root_name), used.into_iter().collect()),
        };

        let mut namespace = Namespace::with_reserved(
            std::iter::once(options.root_name.clone()).chain(options.reserved.iter().cloned()),
        );

        let mut aliased = aliased;
        aliased.sort_by_cached_key(ToString::to_string);
        let aliases = aliased
            .into_iter()
            .map(|path| {
                let name = namespace.fresh(&path_to_name(&path.to_string()), &prefix);
                (path, name)
            })
            .collect();

        let shared_names = diff
            .new_shared_values
            .iter()
            .map(|value| namespace.fresh(&shared_base_name(value), ""))
            .collect();

        Ok(Self {
            root_name: options.root_name.clone(),
            aliases,
            shared_names,
        })
    }

    fn root_var(&self) -> Expr {
        Expr::var(&self.root_name)
    }

    fn aliases_in_order(&self) -> Vec<(&Path, &String)> {
        let mut ordered: Vec<_> = self.aliases.iter().collect();
        ordered.sort_by_cached_key(|(path, _)| path.to_string());
        ordered
    }

    fn groups<'d>(&self, diff: &'d Diff) -> Vec<(Path, Group<'d>)> {
        let mut by_parent: BTreeMap<String, (Path, Group<'d>)> = BTreeMap::new();
        for (path, op) in &diff.changes {
            if let (Some(parent), Some(element)) = (path.parent(), path.last()) {
                by_parent
                    .entry(parent.to_string())
                    .or_insert_with(|| (parent, Vec::new()))
                    .1
                    .push((path, element, op));
            }
        }
        by_parent.into_values().collect()
    }

    fn parent_expr(&self, parent: &Path) -> Expr {
        match self.aliases.get(parent) {
            Some(alias) => Expr::var(alias),
            None => Expr::path(self.root_var(), parent),
        }
    }

    /// `binding` is the index of the shared value being bound, if any
    fn expr(&self, value: &DiffValue, binding: Option<usize>) -> Result<Expr> {
        Ok(match value {
            DiffValue::Leaf { value } => Expr::Literal {
                value: value.clone(),
            },
            DiffValue::Reference { reference } => self.reference_expr(reference, binding)?,
            DiffValue::Record { type_name, fields } => Expr::Record {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(name, field)| Ok((name.clone(), self.expr(field, binding)?)))
                    .collect::<Result<_>>()?,
            },
            DiffValue::Sequence { items } => Expr::Sequence {
                items: items
                    .iter()
                    .map(|item| self.expr(item, binding))
                    .collect::<Result<_>>()?,
            },
            DiffValue::Mapping { entries } => Expr::Mapping {
                entries: entries
                    .iter()
                    .map(|(key, entry)| Ok((key.clone(), self.expr(entry, binding)?)))
                    .collect::<Result<_>>()?,
            },
            DiffValue::Set { members } => Expr::Set {
                members: members.clone(),
            },
        })
    }

    fn reference_expr(&self, reference: &Reference, binding: Option<usize>) -> Result<Expr> {
        match reference.root.as_str() {
            // Shared bindings run before any alias is bound or any path mutated
            OLD_ROOT if binding.is_some() => return Ok(Expr::path(self.root_var(), &reference.target)),
            OLD_ROOT => return Ok(self.parent_expr(&reference.target)),
            NEW_SHARED_VALUES_ROOT => {}
            other => {
                return Err(DeltaError::UnknownReferenceRoot {
                    root: other.to_string(),
                })
            }
        }
        let (index, rest) = reference
            .shared_target()
            .ok_or_else(|| DeltaError::InvalidReferenceTarget {
                reference: reference.to_string(),
                reason: "target must start with an index".to_string(),
            })?;
        if let Some(current) = binding {
            if index >= current {
                return Err(DeltaError::ForwardSharedReference {
                    index: current,
                    target: index,
                });
            }
        }
        let name = self
            .shared_names
            .get(index)
            .ok_or_else(|| DeltaError::InvalidReferenceTarget {
                reference: reference.to_string(),
                reason: format!("only {} new shared values exist", self.shared_names.len()),
            })?;
        Ok(Expr::path(Expr::var(name), &rest))
    }
}

/// Change targets plus every other path reaching the same old node
fn modified_paths(diff: &Diff, store: &NodeStore, old: &Value) -> Result<BTreeSet<Path>> {
    let by_node = paths_by_node(store, old)?;
    let mut modified = BTreeSet::new();
    for path in diff.changes.keys() {
        if let Ok(Value::Node(id)) = follow_path(store, old, path) {
            if let Some(paths) = by_node.get(&id) {
                modified.extend(paths.iter().cloned());
            }
        }
        modified.insert(path.clone());
    }
    Ok(modified)
}

fn shared_base_name(value: &DiffValue) -> String {
    match value {
        DiffValue::Record { type_name, .. } => camel_to_snake(type_name),
        DiffValue::Sequence { .. } => "sequence".to_string(),
        DiffValue::Mapping { .. } => "mapping".to_string(),
        DiffValue::Set { .. } => "set".to_string(),
        DiffValue::Leaf { value } => value.kind_name().to_string(),
        DiffValue::Reference { .. } => "shared".to_string(),
    }
}
