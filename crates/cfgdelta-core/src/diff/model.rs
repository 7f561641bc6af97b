//! Diff data types.
//!
//! Changes live in a `BTreeMap` keyed by path, so iteration, rendering and
//! serialization are deterministic. On the wire the change map is a list of
//! `{path, op}` entries because paths are not string keys.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::errors::Result;
use crate::model::{Key, Scalar, Value};
use crate::path::{Path, PathElement};

/// Reference root naming the unmodified old tree
pub const OLD_ROOT: &str = "old";
/// Reference root naming the diff's `new_shared_values` list
pub const NEW_SHARED_VALUES_ROOT: &str = "new_shared_values";

/// Symbolic pointer embedded in diff operands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub root: String,
    pub target: Path,
}

impl Reference {
    pub fn new(root: impl Into<String>, target: Path) -> Self {
        Self {
            root: root.into(),
            target,
        }
    }

    /// Reference into the old tree
    pub fn old(target: Path) -> Self {
        Self::new(OLD_ROOT, target)
    }

    /// Reference to `new_shared_values[index]`
    pub fn new_shared(index: usize) -> Self {
        Self::new(NEW_SHARED_VALUES_ROOT, Path::root().index(index))
    }

    /// Build from a root token and path text
    ///
    /// # Errors
    ///
    /// Returns `PathSyntax` if `target` does not parse.
    pub fn parse(root: &str, target: &str) -> Result<Self> {
        Ok(Self::new(root, Path::parse(target)?))
    }

    pub fn is_old(&self) -> bool {
        self.root == OLD_ROOT
    }

    /// Shared index and the remaining path, for `new_shared_values` references
    pub fn shared_target(&self) -> Option<(usize, Path)> {
        if self.root != NEW_SHARED_VALUES_ROOT {
            return None;
        }
        match self.target.elements().split_first() {
            Some((PathElement::Index(i), rest)) => Some((*i, Path::new(rest.to_vec()))),
            _ => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Reference: {}{}>", self.root, self.target)
    }
}

/// Operand value of a diff: a structural copy of a new-tree node whose
/// children are themselves diff values, a leaf, or a reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffValue {
    Leaf {
        value: Scalar,
    },
    Reference {
        reference: Reference,
    },
    Record {
        type_name: String,
        fields: IndexMap<String, DiffValue>,
    },
    Sequence {
        items: Vec<DiffValue>,
    },
    Mapping {
        #[serde(with = "indexmap::map::serde_seq")]
        entries: IndexMap<Key, DiffValue>,
    },
    Set {
        members: BTreeSet<Key>,
    },
}

impl DiffValue {
    pub fn leaf(value: impl Into<Scalar>) -> Self {
        DiffValue::Leaf {
            value: value.into(),
        }
    }

    pub fn reference(reference: Reference) -> Self {
        DiffValue::Reference { reference }
    }

    pub fn record<I, K>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, DiffValue)>,
        K: Into<String>,
    {
        DiffValue::Record {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            DiffValue::Reference { reference } => Some(reference),
            _ => None,
        }
    }

    /// Every reference inside this value, depth first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            DiffValue::Reference { reference } => out.push(reference),
            DiffValue::Record { fields, .. } => {
                fields.values().for_each(|v| v.collect_references(out))
            }
            DiffValue::Sequence { items } => items.iter().for_each(|v| v.collect_references(out)),
            DiffValue::Mapping { entries } => {
                entries.values().for_each(|v| v.collect_references(out))
            }
            DiffValue::Leaf { .. } | DiffValue::Set { .. } => {}
        }
    }
}

impl fmt::Display for DiffValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffValue::Leaf { value } => write!(f, "{}", value),
            DiffValue::Reference { reference } => write!(f, "{}", reference),
            DiffValue::Record { type_name, fields } => {
                write!(f, "{}(", type_name)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                write!(f, ")")
            }
            DiffValue::Sequence { items } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            DiffValue::Mapping { entries } => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            DiffValue::Set { members } => {
                write!(f, "set{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<Reference> for DiffValue {
    fn from(reference: Reference) -> Self {
        DiffValue::Reference { reference }
    }
}

impl From<Scalar> for DiffValue {
    fn from(value: Scalar) -> Self {
        DiffValue::Leaf { value }
    }
}

/// Operation kind shared by symbolic and resolved diffs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SetValue,
    ModifyValue,
    DeleteValue,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::SetValue => "SetValue",
            OperationKind::ModifyValue => "ModifyValue",
            OperationKind::DeleteValue => "DeleteValue",
        }
    }
}

/// A change to one path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffOperation {
    /// Add a value where there is none
    SetValue { new_value: DiffValue },
    /// Replace an existing value
    ModifyValue { new_value: DiffValue },
    /// Remove an existing value
    DeleteValue,
}

impl DiffOperation {
    pub fn set(new_value: impl Into<DiffValue>) -> Self {
        DiffOperation::SetValue {
            new_value: new_value.into(),
        }
    }

    pub fn modify(new_value: impl Into<DiffValue>) -> Self {
        DiffOperation::ModifyValue {
            new_value: new_value.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            DiffOperation::SetValue { .. } => OperationKind::SetValue,
            DiffOperation::ModifyValue { .. } => OperationKind::ModifyValue,
            DiffOperation::DeleteValue => OperationKind::DeleteValue,
        }
    }

    pub fn new_value(&self) -> Option<&DiffValue> {
        match self {
            DiffOperation::SetValue { new_value } | DiffOperation::ModifyValue { new_value } => {
                Some(new_value)
            }
            DiffOperation::DeleteValue => None,
        }
    }
}

impl fmt::Display for DiffOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.new_value() {
            Some(value) => write!(f, "{}(new_value={})", self.kind().name(), value),
            None => write!(f, "{}()", self.kind().name()),
        }
    }
}

/// Per-path changes plus the new values shared between several locations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    #[serde(with = "change_list")]
    pub changes: BTreeMap<Path, DiffOperation>,
    #[serde(default)]
    pub new_shared_values: Vec<DiffValue>,
}

impl Diff {
    pub fn new(changes: BTreeMap<Path, DiffOperation>, new_shared_values: Vec<DiffValue>) -> Self {
        Self {
            changes,
            new_shared_values,
        }
    }

    /// Diff without shared values
    pub fn from_changes<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = (Path, DiffOperation)>,
    {
        Self {
            changes: changes.into_iter().collect(),
            new_shared_values: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.new_shared_values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Resolved counterpart of [`DiffOperation`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperation {
    SetValue(Value),
    ModifyValue(Value),
    DeleteValue,
}

impl ResolvedOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            ResolvedOperation::SetValue(_) => OperationKind::SetValue,
            ResolvedOperation::ModifyValue(_) => OperationKind::ModifyValue,
            ResolvedOperation::DeleteValue => OperationKind::DeleteValue,
        }
    }

    pub fn new_value(&self) -> Option<&Value> {
        match self {
            ResolvedOperation::SetValue(value) | ResolvedOperation::ModifyValue(value) => {
                Some(value)
            }
            ResolvedOperation::DeleteValue => None,
        }
    }
}

impl fmt::Display for ResolvedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.new_value() {
            Some(value) => write!(f, "{}(new_value={})", self.kind().name(), value),
            None => write!(f, "{}()", self.kind().name()),
        }
    }
}

/// Diff whose operands are concrete values in a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDiff {
    pub changes: BTreeMap<Path, ResolvedOperation>,
    pub new_shared_values: Vec<Value>,
}

impl ResolvedDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.new_shared_values.is_empty()
    }
}

mod change_list {
    use super::{DiffOperation, Path};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        path: &'a Path,
        op: &'a DiffOperation,
    }

    #[derive(Deserialize)]
    struct Entry {
        path: Path,
        op: DiffOperation,
    }

    pub fn serialize<S: Serializer>(
        changes: &BTreeMap<Path, DiffOperation>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(changes.iter().map(|(path, op)| EntryRef { path, op }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Path, DiffOperation>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        let mut changes = BTreeMap::new();
        for entry in entries {
            if changes.insert(entry.path.clone(), entry.op).is_some() {
                return Err(serde::de::Error::custom(format!(
                    "duplicate change for path {:?}",
                    entry.path.to_string()
                )));
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        let reference = Reference::old(Path::root().attr("x").index(0));
        assert_eq!(reference.to_string(), "<Reference: old.x[0]>");
        assert_eq!(
            Reference::new_shared(2).to_string(),
            "<Reference: new_shared_values[2]>"
        );
    }

    #[test]
    fn test_shared_target_splits_index() {
        let reference = Reference::parse(NEW_SHARED_VALUES_ROOT, "[1].a").unwrap();
        assert_eq!(reference.shared_target(), Some((1, Path::root().attr("a"))));
        assert_eq!(Reference::old(Path::root()).shared_target(), None);
    }

    #[test]
    fn test_operation_display() {
        let op = DiffOperation::modify(DiffValue::record(
            "B",
            [("a", DiffValue::leaf(3i64))],
        ));
        assert_eq!(op.to_string(), "ModifyValue(new_value=B(a=3))");
        assert_eq!(DiffOperation::DeleteValue.to_string(), "DeleteValue()");
    }

    #[test]
    fn test_diff_json_uses_change_list() {
        let diff = Diff::from_changes([
            (Path::root().attr("x"), DiffOperation::DeleteValue),
            (Path::root().key(1i64), DiffOperation::set(DiffValue::leaf("v"))),
        ]);
        let json = serde_json::to_value(&diff).unwrap();
        assert!(json["changes"].is_array());
        assert_eq!(json["changes"].as_array().unwrap().len(), 2);

        let back: Diff = serde_json::from_value(json).unwrap();
        assert_eq!(back, diff);
    }

    #[test]
    fn test_duplicate_paths_rejected() {
        let json = r#"{"changes": [
            {"path": [{"kind": "attribute", "value": "x"}], "op": {"op": "delete_value"}},
            {"path": [{"kind": "attribute", "value": "x"}], "op": {"op": "delete_value"}}
        ]}"#;
        assert!(serde_json::from_str::<Diff>(json).is_err());
    }

    #[test]
    fn test_mapping_value_with_integer_keys_serializes() {
        let mut entries = IndexMap::new();
        entries.insert(Key::Int(1), DiffValue::leaf(true));
        let value = DiffValue::Mapping { entries };
        let json = serde_json::to_string(&value).unwrap();
        let back: DiffValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
