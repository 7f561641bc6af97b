//! JSON documents to and from arena trees.
//!
//! | JSON                                   | Tree                    |
//! |----------------------------------------|-------------------------|
//! | `null`, booleans, numbers, strings     | leaf scalars            |
//! | `[...]` or `{"$seq": [...]}`           | sequence                |
//! | `{"__type__": "T", "field": ...}`      | record of type `T`      |
//! | `{"$set": [...]}`                      | set                     |
//! | any other object                       | mapping with string keys|
//!
//! Any object form may carry `"$id": "name"`; `{"$ref": "name"}` elsewhere
//! in the document then denotes the same node, which is how sharing and
//! cycles are written. A shared sequence is exported in the `$seq` form so
//! it can carry its `$id`.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value as Json};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::errors::{DeltaError, Result};
use crate::model::{Key, Node, NodeId, NodeStore, Record, Scalar, Value};
use crate::path::{is_field_name, TYPE_SELECTOR_NAME};
use crate::traversal::{child_nodes, Reachable};

pub const ID_KEY: &str = "$id";
pub const REF_KEY: &str = "$ref";
pub const SET_KEY: &str = "$set";
pub const SEQ_KEY: &str = "$seq";

const RESERVED_KEYS: [&str; 5] = [TYPE_SELECTOR_NAME, ID_KEY, REF_KEY, SET_KEY, SEQ_KEY];

fn interchange_error(message: impl Into<String>) -> DeltaError {
    DeltaError::Interchange {
        message: message.into(),
    }
}

/// Build a tree in `store` from a JSON document.
///
/// # Errors
///
/// Returns `Interchange` for duplicate or unknown `$id`/`$ref` names, a
/// non-string `__type__`, record field names that a path cannot address,
/// set members that are not strings, integers or booleans, and numbers that
/// fit neither `i64` nor `f64`.
pub fn import_json(store: &mut NodeStore, doc: &Json) -> Result<Value> {
    let mut importer = Importer {
        ids: HashMap::new(),
    };
    importer.declare(store, doc)?;
    let root = importer.build(store, doc)?;
    tracing::trace!(nodes = store.len(), shared = importer.ids.len(), "imported JSON tree");
    Ok(root)
}

/// Parse JSON text and import it.
///
/// # Errors
///
/// Returns `Interchange` if the text is not JSON, otherwise as [`import_json`].
pub fn import_json_str(store: &mut NodeStore, text: &str) -> Result<Value> {
    let doc: Json = serde_json::from_str(text).map_err(|e| interchange_error(e.to_string()))?;
    import_json(store, &doc)
}

struct Importer {
    ids: HashMap<String, NodeId>,
}

impl Importer {
    /// Allocate a handle for every `$id` so references may point forward
    fn declare(&mut self, store: &mut NodeStore, doc: &Json) -> Result<()> {
        match doc {
            Json::Array(items) => items.iter().try_for_each(|item| self.declare(store, item)),
            Json::Object(map) => {
                if let Some(name) = map.get(ID_KEY) {
                    let name = name
                        .as_str()
                        .ok_or_else(|| interchange_error(format!("{} must be a string", ID_KEY)))?;
                    if self.ids.contains_key(name) {
                        return Err(interchange_error(format!("duplicate {} {:?}", ID_KEY, name)));
                    }
                    let id = store.insert(Node::Sequence(Vec::new()));
                    self.ids.insert(name.to_string(), id);
                }
                map.values().try_for_each(|value| self.declare(store, value))
            }
            _ => Ok(()),
        }
    }

    fn build(&self, store: &mut NodeStore, doc: &Json) -> Result<Value> {
        let map = match doc {
            Json::Null => return Ok(Value::null()),
            Json::Bool(b) => return Ok(Value::from(*b)),
            Json::Number(n) => return Ok(Value::Leaf(number_to_scalar(n)?)),
            Json::String(s) => return Ok(Value::from(s.as_str())),
            Json::Array(items) => {
                let node = Node::Sequence(self.build_all(store, items)?);
                return Ok(Value::Node(store.insert(node)));
            }
            Json::Object(map) => map,
        };

        if let Some(name) = map.get(REF_KEY) {
            if map.len() != 1 {
                return Err(interchange_error(format!("{} objects take no other keys", REF_KEY)));
            }
            let name = name
                .as_str()
                .ok_or_else(|| interchange_error(format!("{} must be a string", REF_KEY)))?;
            return self
                .ids
                .get(name)
                .map(|&id| Value::Node(id))
                .ok_or_else(|| interchange_error(format!("unknown {} {:?}", REF_KEY, name)));
        }

        let node = if let Some(members) = map.get(SET_KEY) {
            let members = members
                .as_array()
                .ok_or_else(|| interchange_error(format!("{} must be an array", SET_KEY)))?;
            Node::Set(members.iter().map(json_to_key).collect::<Result<BTreeSet<Key>>>()?)
        } else if let Some(items) = map.get(SEQ_KEY) {
            let items = items
                .as_array()
                .ok_or_else(|| interchange_error(format!("{} must be an array", SEQ_KEY)))?;
            Node::Sequence(self.build_all(store, items)?)
        } else if let Some(type_name) = map.get(TYPE_SELECTOR_NAME) {
            let type_name = type_name.as_str().ok_or_else(|| {
                interchange_error(format!("{} must be a string", TYPE_SELECTOR_NAME))
            })?;
            let mut record = Record::new(type_name);
            for (name, value) in fields(map) {
                if !is_field_name(name) {
                    return Err(interchange_error(format!(
                        "record field {:?} of {} is not an identifier",
                        name, type_name
                    )));
                }
                record = record.with_field(name.as_str(), self.build(store, value)?);
            }
            Node::Record(record)
        } else {
            let mut entries = IndexMap::with_capacity(map.len());
            for (name, value) in fields(map) {
                entries.insert(Key::from(name.as_str()), self.build(store, value)?);
            }
            Node::Mapping(entries)
        };

        match map.get(ID_KEY).and_then(Json::as_str).and_then(|name| self.ids.get(name)) {
            Some(&id) => {
                store.replace(id, node)?;
                Ok(Value::Node(id))
            }
            None => Ok(Value::Node(store.insert(node))),
        }
    }

    fn build_all(&self, store: &mut NodeStore, items: &[Json]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.build(store, item)).collect()
    }
}

/// Object entries other than the interchange markers
fn fields(map: &Map<String, Json>) -> impl Iterator<Item = (&String, &Json)> {
    map.iter()
        .filter(|(name, _)| name.as_str() != TYPE_SELECTOR_NAME && name.as_str() != ID_KEY)
}

fn number_to_scalar(n: &Number) -> Result<Scalar> {
    if let Some(i) = n.as_i64() {
        Ok(Scalar::Int(i))
    } else {
        n.as_f64()
            .map(Scalar::Float)
            .ok_or_else(|| interchange_error(format!("number {} is out of range", n)))
    }
}

fn json_to_key(value: &Json) -> Result<Key> {
    match value {
        Json::String(s) => Ok(Key::Str(s.clone())),
        Json::Bool(b) => Ok(Key::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Key::Int)
            .ok_or_else(|| interchange_error(format!("set member {} is not an integer", n))),
        other => Err(interchange_error(format!("set member {} is not a key", other))),
    }
}

fn key_to_json(key: &Key) -> Json {
    match key {
        Key::Str(s) => Json::String(s.clone()),
        Key::Int(i) => Json::from(*i),
        Key::Bool(b) => Json::Bool(*b),
    }
}

fn scalar_to_json(scalar: &Scalar) -> Result<Json> {
    Ok(match scalar {
        Scalar::Null => Json::Null,
        Scalar::Bool(b) => Json::Bool(*b),
        Scalar::Int(i) => Json::from(*i),
        Scalar::Float(x) => Number::from_f64(*x)
            .map(Json::Number)
            .ok_or_else(|| interchange_error(format!("{} has no JSON form", x)))?,
        Scalar::Str(s) => Json::String(s.clone()),
    })
}

/// Write the tree under `root` as a JSON document.
///
/// Nodes reachable through more than one edge get a `$id` at their first
/// occurrence in depth-first order and a `$ref` everywhere after.
///
/// # Errors
///
/// Returns `Interchange` for non-finite floats, mapping keys that are not
/// strings or that collide with the interchange markers, and `NodeNotFound`
/// for dangling handles.
pub fn export_json(store: &NodeStore, root: &Value) -> Result<Json> {
    let mut exporter = Exporter {
        store,
        shared: shared_nodes(store, root)?,
        names: HashMap::new(),
    };
    exporter.export(root)
}

/// Nodes with two or more incoming edges, the root counting as one
fn shared_nodes(store: &NodeStore, root: &Value) -> Result<HashSet<NodeId>> {
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    if let Some(id) = root.node_id() {
        in_degree.insert(id, 1);
    }
    for &id in Reachable::walk(store, root)?.order() {
        for (_, child) in child_nodes(store.get(id)?) {
            *in_degree.entry(child).or_default() += 1;
        }
    }
    Ok(in_degree
        .into_iter()
        .filter_map(|(id, count)| (count >= 2).then_some(id))
        .collect())
}

struct Exporter<'s> {
    store: &'s NodeStore,
    shared: HashSet<NodeId>,
    names: HashMap<NodeId, String>,
}

impl Exporter<'_> {
    fn export(&mut self, value: &Value) -> Result<Json> {
        let id = match value {
            Value::Leaf(scalar) => return scalar_to_json(scalar),
            Value::Node(id) => *id,
        };
        if let Some(name) = self.names.get(&id) {
            let mut reference = Map::new();
            reference.insert(REF_KEY.to_string(), Json::String(name.clone()));
            return Ok(Json::Object(reference));
        }

        let shared_name = self.shared.contains(&id).then(|| {
            let name = format!("n{}", self.names.len() + 1);
            self.names.insert(id, name.clone());
            name
        });

        let mut object = Map::new();
        if let Some(name) = &shared_name {
            object.insert(ID_KEY.to_string(), Json::String(name.clone()));
        }
        match self.store.get(id)? {
            Node::Sequence(items) => {
                let items = items
                    .iter()
                    .map(|item| self.export(item))
                    .collect::<Result<Vec<_>>>()?;
                if shared_name.is_none() {
                    return Ok(Json::Array(items));
                }
                object.insert(SEQ_KEY.to_string(), Json::Array(items));
            }
            Node::Record(record) => {
                object.insert(
                    TYPE_SELECTOR_NAME.to_string(),
                    Json::String(record.type_name().to_string()),
                );
                for (name, field) in record.fields() {
                    let field = self.export(field)?;
                    object.insert(name.to_string(), field);
                }
            }
            Node::Mapping(entries) => {
                for (key, entry) in entries {
                    let name = match key {
                        Key::Str(s) if !RESERVED_KEYS.contains(&s.as_str()) => s.clone(),
                        other => {
                            return Err(interchange_error(format!(
                                "mapping key {} cannot be written as a JSON object key",
                                other
                            )))
                        }
                    };
                    let entry = self.export(entry)?;
                    object.insert(name, entry);
                }
            }
            Node::Set(members) => {
                object.insert(
                    SET_KEY.to_string(),
                    Json::Array(members.iter().map(key_to_json).collect()),
                );
            }
        }
        Ok(Json::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{follow_path, Path};
    use serde_json::json;

    #[test]
    fn test_import_forms() {
        let mut store = NodeStore::new();
        let root = import_json(
            &mut store,
            &json!({
                "__type__": "Root",
                "seq": [1, 2.5, "x", null, true],
                "map": {"k": "v"},
                "tags": {"$set": ["b", "a", 3]}
            }),
        )
        .unwrap();

        let record = store.get(root.node_id().unwrap()).unwrap().as_record().unwrap().clone();
        assert_eq!(record.type_name(), "Root");
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["seq", "map", "tags"]);

        let seq = follow_path(&store, &root, &Path::parse(".seq[1]").unwrap()).unwrap();
        assert_eq!(seq, Value::Leaf(Scalar::Float(2.5)));
        let v = follow_path(&store, &root, &Path::parse(r#".map["k"]"#).unwrap()).unwrap();
        assert_eq!(v, Value::from("v"));
        let tags = follow_path(&store, &root, &Path::parse(".tags").unwrap()).unwrap();
        match store.get(tags.node_id().unwrap()).unwrap() {
            Node::Set(members) => assert_eq!(members.len(), 3),
            other => panic!("expected a set, got {:?}", other),
        }
    }

    #[test]
    fn test_ref_before_id_and_cycle() {
        let mut store = NodeStore::new();
        let root = import_json(
            &mut store,
            &json!({
                "__type__": "Root",
                "first": {"$ref": "n"},
                "second": {"$id": "n", "__type__": "Node", "me": {"$ref": "n"}}
            }),
        )
        .unwrap();

        let first = follow_path(&store, &root, &Path::parse(".first").unwrap()).unwrap();
        let second = follow_path(&store, &root, &Path::parse(".second").unwrap()).unwrap();
        let me = follow_path(&store, &root, &Path::parse(".second.me").unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, me);
    }

    #[test]
    fn test_unknown_and_duplicate_ids() {
        let mut store = NodeStore::new();
        let err = import_json(&mut store, &json!({"a": {"$ref": "missing"}})).unwrap_err();
        assert!(err.to_string().contains("unknown $ref"));

        let err = import_json(&mut store, &json!([{"$id": "x"}, {"$id": "x"}])).unwrap_err();
        assert!(err.to_string().contains("duplicate $id"));
    }

    #[test]
    fn test_record_field_must_be_addressable() {
        let mut store = NodeStore::new();
        let err = import_json(&mut store, &json!({"__type__": "Conf", "my-field": 1})).unwrap_err();
        assert!(matches!(err, DeltaError::Interchange { .. }));
        assert!(err.to_string().contains("\"my-field\""));

        // Mapping keys are written in brackets, so any string works there
        let root = import_json(&mut store, &json!({"my-field": 1})).unwrap();
        let key = Path::parse("[\"my-field\"]").unwrap();
        assert_eq!(follow_path(&store, &root, &key).unwrap(), Value::from(1i64));
    }

    #[test]
    fn test_export_marks_shared_nodes() {
        let mut store = NodeStore::new();
        let shared = store.sequence([Value::from(1i64)]);
        let root = store.record("Root", [("a", shared.clone()), ("b", shared)]);

        let doc = export_json(&store, &root).unwrap();

        assert_eq!(
            doc,
            json!({
                "__type__": "Root",
                "a": {"$id": "n1", "$seq": [1]},
                "b": {"$ref": "n1"}
            })
        );
    }

    #[test]
    fn test_export_then_import_preserves_cycle() {
        let mut store = NodeStore::new();
        let root = import_json(&mut store, &json!({"$id": "top", "__type__": "Loop", "self": {"$ref": "top"}})).unwrap();

        let doc = export_json(&store, &root).unwrap();
        assert_eq!(doc, json!({"$id": "n1", "__type__": "Loop", "self": {"$ref": "n1"}}));
    }

    #[test]
    fn test_export_rejects_reserved_mapping_key() {
        let mut store = NodeStore::new();
        let root = store.mapping([("$ref", Value::from(1i64))]);
        assert!(export_json(&store, &root).is_err());

        let root = store.mapping([(1i64, Value::from(1i64))]);
        assert!(export_json(&store, &root).is_err());
    }
}
