use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable handle of a node in a [`NodeStore`](crate::model::NodeStore)
///
/// As wide as the arena index, so every slot has its own handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque leaf value, compared by equality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Equal value and equal scalar kind (`Int(1)` is not `Float(1.0)`).
    ///
    /// Floats compare with IEEE `==`, so a NaN leaf never equals another
    /// NaN and is always reported as changed.
    pub fn same_as(&self, other: &Scalar) -> bool {
        self == other
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "str",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::Str(s) => write_quoted(f, s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// Double-quoted with the escapes the path grammar understands
pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

/// Mapping key or set member
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write_quoted(f, s),
            Key::Int(i) => write!(f, "{}", i),
            Key::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Bool(value)
    }
}

impl From<Key> for Scalar {
    fn from(key: Key) -> Self {
        match key {
            Key::Str(s) => Scalar::Str(s),
            Key::Int(i) => Scalar::Int(i),
            Key::Bool(b) => Scalar::Bool(b),
        }
    }
}

/// A slot in a tree: an inline leaf or a handle to a memoizable node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Leaf(Scalar),
    Node(NodeId),
}

impl Value {
    pub fn leaf(scalar: impl Into<Scalar>) -> Self {
        Value::Leaf(scalar.into())
    }

    pub fn null() -> Self {
        Value::Leaf(Scalar::Null)
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            Value::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Scalar> {
        match self {
            Value::Leaf(scalar) => Some(scalar),
            Value::Node(_) => None,
        }
    }

    /// Only arena nodes have identity
    pub fn is_memoizable(&self) -> bool {
        matches!(self, Value::Node(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Leaf(scalar) => write!(f, "{}", scalar),
            Value::Node(id) => write!(f, "<node {}>", id),
        }
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Leaf(scalar)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Leaf(Scalar::Int(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Leaf(Scalar::Float(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Leaf(Scalar::Bool(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Leaf(Scalar::Str(value.to_string()))
    }
}

/// Typed record with named fields in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) -> Option<Value> {
        self.fields.insert(name, value)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub(crate) fn set_type_name(&mut self, type_name: String) {
        self.type_name = type_name;
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.values_mut()
    }
}

/// Discriminant of a memoizable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Record,
    Sequence,
    Mapping,
    Set,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Record => "record",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
            NodeKind::Set => "set",
        };
        write!(f, "{}", name)
    }
}

/// A memoizable node stored in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Record(Record),
    Sequence(Vec<Value>),
    Mapping(IndexMap<Key, Value>),
    Set(BTreeSet<Key>),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Record(_) => NodeKind::Record,
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Mapping(_) => NodeKind::Mapping,
            Node::Set(_) => NodeKind::Set,
        }
    }

    /// Number of fields, items, entries or members
    pub fn len(&self) -> usize {
        match self {
            Node::Record(record) => record.len(),
            Node::Sequence(items) => items.len(),
            Node::Mapping(entries) => entries.len(),
            Node::Set(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Node::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Type name of a record; the kind name for other nodes
    pub fn type_label(&self) -> String {
        match self {
            Node::Record(record) => record.type_name().to_string(),
            other => other.kind().to_string(),
        }
    }

    /// Child slots that may hold nodes (set members are always leaves)
    pub(crate) fn values_mut(&mut self) -> Box<dyn Iterator<Item = &mut Value> + '_> {
        match self {
            Node::Record(record) => Box::new(record.values_mut()),
            Node::Sequence(items) => Box::new(items.iter_mut()),
            Node::Mapping(entries) => Box::new(entries.values_mut()),
            Node::Set(_) => Box::new(std::iter::empty()),
        }
    }
}
