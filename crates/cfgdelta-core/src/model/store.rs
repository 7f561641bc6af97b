use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::errors::{DeltaError, Result};
use crate::model::{Key, Node, NodeId, NodeKind, Record, TypeSchema, Value};

/// Arena of memoizable nodes
///
/// Both trees of a diff live in the same store and are addressed by
/// [`NodeId`] handles. Handles are never reused. Construction helpers are
/// not schema-checked; the field and type mutators are.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: Vec<Node>,
    schema: TypeSchema,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: TypeSchema) -> Self {
        Self {
            nodes: Vec::new(),
            schema,
        }
    }

    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    pub fn set_schema(&mut self, schema: TypeSchema) {
        self.schema = schema;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node and return its handle
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Get a node by handle
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the handle was not issued by this store.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or(DeltaError::NodeNotFound { node_id: id })
    }

    /// Get a mutable node by handle
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the handle was not issued by this store.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(DeltaError::NodeNotFound { node_id: id })
    }

    /// Overwrite a node in place, keeping its handle
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the handle was not issued by this store.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Result<Node> {
        let slot = self.get_mut(id)?;
        Ok(std::mem::replace(slot, node))
    }

    /// Kind of the node behind a value, `None` for leaves
    pub fn kind_of(&self, value: &Value) -> Option<NodeKind> {
        value
            .node_id()
            .and_then(|id| self.get(id).ok())
            .map(Node::kind)
    }

    // ===== Construction helpers =====

    pub fn record<I, K>(&mut self, type_name: &str, fields: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut record = Record::new(type_name);
        for (name, value) in fields {
            record.insert(name.into(), value);
        }
        Value::Node(self.insert(Node::Record(record)))
    }

    pub fn sequence<I>(&mut self, items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Node(self.insert(Node::Sequence(items.into_iter().collect())))
    }

    pub fn mapping<I, K>(&mut self, entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Key>,
    {
        let entries: IndexMap<Key, Value> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Node(self.insert(Node::Mapping(entries)))
    }

    pub fn set<I, K>(&mut self, members: I) -> Value
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let members: BTreeSet<Key> = members.into_iter().map(Into::into).collect();
        Value::Node(self.insert(Node::Set(members)))
    }

    // ===== Record operations =====

    fn record_mut(&mut self, id: NodeId) -> Result<&mut Record> {
        match self.get_mut(id)? {
            Node::Record(record) => Ok(record),
            other => Err(DeltaError::WrongNodeKind {
                node_id: id,
                expected: NodeKind::Record,
                found: other.kind(),
            }),
        }
    }

    /// Set a record field, subject to the type schema
    ///
    /// # Errors
    ///
    /// Returns `FieldRejected` if the record's type does not permit the field,
    /// `WrongNodeKind` if the node is not a record.
    pub fn set_field(&mut self, id: NodeId, name: &str, value: Value) -> Result<Option<Value>> {
        let type_name = self.record_mut(id)?.type_name().to_string();
        if !self.schema.permits(&type_name, name) {
            return Err(DeltaError::FieldRejected {
                type_name,
                field: name.to_string(),
            });
        }
        Ok(self.record_mut(id)?.insert(name.to_string(), value))
    }

    /// Remove a record field, returning its value if it was present
    ///
    /// # Errors
    ///
    /// Returns `WrongNodeKind` if the node is not a record.
    pub fn delete_field(&mut self, id: NodeId, name: &str) -> Result<Option<Value>> {
        Ok(self.record_mut(id)?.remove(name))
    }

    /// Change a record's type, subject to the type schema
    ///
    /// # Errors
    ///
    /// Returns `TypeRejected` if the record holds a field the new type does
    /// not permit, `WrongNodeKind` if the node is not a record.
    pub fn set_type_name(&mut self, id: NodeId, type_name: &str) -> Result<()> {
        let schema = &self.schema;
        let record = match self.nodes.get_mut(id.index()) {
            Some(Node::Record(record)) => record,
            Some(other) => {
                return Err(DeltaError::WrongNodeKind {
                    node_id: id,
                    expected: NodeKind::Record,
                    found: other.kind(),
                })
            }
            None => return Err(DeltaError::NodeNotFound { node_id: id }),
        };
        if let Some(field) = record.field_names().find(|f| !schema.permits(type_name, f)) {
            return Err(DeltaError::TypeRejected {
                type_name: type_name.to_string(),
                field: field.to_string(),
            });
        }
        record.set_type_name(type_name.to_string());
        Ok(())
    }

    // ===== Sequence and mapping operations =====

    /// Overwrite an existing sequence item
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the index is out of range, `WrongNodeKind`
    /// if the node is not a sequence.
    pub fn set_item(&mut self, id: NodeId, index: usize, value: Value) -> Result<Value> {
        match self.get_mut(id)? {
            Node::Sequence(items) => match items.get_mut(index) {
                Some(slot) => Ok(std::mem::replace(slot, value)),
                None => Err(DeltaError::PathNotFound {
                    element: format!("[{}]", index),
                }),
            },
            other => Err(DeltaError::WrongNodeKind {
                node_id: id,
                expected: NodeKind::Sequence,
                found: other.kind(),
            }),
        }
    }

    /// Insert or overwrite a mapping entry
    ///
    /// # Errors
    ///
    /// Returns `WrongNodeKind` if the node is not a mapping.
    pub fn set_entry(&mut self, id: NodeId, key: Key, value: Value) -> Result<Option<Value>> {
        match self.get_mut(id)? {
            Node::Mapping(entries) => Ok(entries.insert(key, value)),
            other => Err(DeltaError::WrongNodeKind {
                node_id: id,
                expected: NodeKind::Mapping,
                found: other.kind(),
            }),
        }
    }

    /// Remove a mapping entry, returning its value if it was present
    ///
    /// # Errors
    ///
    /// Returns `WrongNodeKind` if the node is not a mapping.
    pub fn delete_entry(&mut self, id: NodeId, key: &Key) -> Result<Option<Value>> {
        match self.get_mut(id)? {
            Node::Mapping(entries) => Ok(entries.shift_remove(key)),
            other => Err(DeltaError::WrongNodeKind {
                node_id: id,
                expected: NodeKind::Mapping,
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(store: &mut NodeStore) -> NodeId {
        store
            .record("A", [("x", Value::from(5i64)), ("z", Value::from(2i64))])
            .node_id()
            .unwrap()
    }

    #[test]
    fn test_get_unknown_handle_fails() {
        let store = NodeStore::new();
        let err = store.get(NodeId(7)).unwrap_err();
        assert!(matches!(err, DeltaError::NodeNotFound { .. }));
    }

    #[test]
    fn test_handles_follow_arena_positions() {
        let mut store = NodeStore::new();
        let ids: Vec<NodeId> = (0..70_000)
            .map(|_| store.insert(Node::Sequence(Vec::new())))
            .collect();
        assert!(ids.iter().enumerate().all(|(i, id)| id.index() == i));
        assert_eq!(store.len(), 70_000);
        assert_ne!(ids[0], ids[65_536]);
    }

    #[test]
    fn test_replace_keeps_handle() {
        let mut store = NodeStore::new();
        let id = store.sequence([]).node_id().unwrap();
        let old = store
            .replace(id, Node::Sequence(vec![Value::from(1i64)]))
            .unwrap();
        assert!(old.is_empty());
        assert_eq!(store.get(id).unwrap().len(), 1);
    }

    #[test]
    fn test_set_field_rejected_by_closed_type() {
        let mut store = NodeStore::with_schema(TypeSchema::new().with_type("A", ["x", "z"]));
        let id = point(&mut store);
        let err = store.set_field(id, "a", Value::from(3i64)).unwrap_err();
        assert_eq!(
            err,
            DeltaError::FieldRejected {
                type_name: "A".to_string(),
                field: "a".to_string()
            }
        );
    }

    #[test]
    fn test_set_type_rejected_while_illegal_field_present() {
        let schema = TypeSchema::new()
            .with_type("A", ["x", "z"])
            .with_type("B", ["x", "a"]);
        let mut store = NodeStore::with_schema(schema);
        let id = point(&mut store);

        assert!(matches!(
            store.set_type_name(id, "B"),
            Err(DeltaError::TypeRejected { .. })
        ));

        store.delete_field(id, "z").unwrap();
        store.set_type_name(id, "B").unwrap();
        store.set_field(id, "a", Value::from(3i64)).unwrap();
        let record = store.get(id).unwrap().as_record().unwrap();
        assert_eq!(record.type_name(), "B");
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["x", "a"]);
    }

    #[test]
    fn test_set_item_out_of_range() {
        let mut store = NodeStore::new();
        let id = store.sequence([Value::from(1i64)]).node_id().unwrap();
        assert!(store.set_item(id, 3, Value::null()).is_err());
        assert_eq!(store.set_item(id, 0, Value::null()).unwrap(), Value::from(1i64));
    }

    #[test]
    fn test_mapping_entries() {
        let mut store = NodeStore::new();
        let id = store
            .mapping([("a", Value::from(1i64))])
            .node_id()
            .unwrap();
        store.set_entry(id, Key::from("b"), Value::from(2i64)).unwrap();
        assert_eq!(
            store.delete_entry(id, &Key::from("a")).unwrap(),
            Some(Value::from(1i64))
        );
        assert_eq!(store.get(id).unwrap().len(), 1);
        assert!(store.delete_field(id, "a").is_err());
    }
}
