#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cfgdelta_core::apply::apply_diff;
use cfgdelta_core::diff::Diff;
use cfgdelta_core::interchange::{export_json, import_json};
use cfgdelta_core::model::NodeStore;
use cfgdelta_core::path::Path;
use common::heuristic_diff;
use serde_json::json;

#[test]
fn test_json_documents_diff_and_patch() {
    // GIVEN two JSON documents sharing a node on the new side
    let mut store = NodeStore::new();
    let old = import_json(
        &mut store,
        &json!({
            "__type__": "Trainer",
            "steps": 100,
            "optimizer": {"__type__": "Adam", "lr": 0.1},
            "tags": {"$set": ["a"]}
        }),
    )
    .unwrap();
    let new = import_json(
        &mut store,
        &json!({
            "__type__": "Trainer",
            "steps": 200,
            "optimizer": {"$id": "opt", "__type__": "Sgd", "lr": 0.1},
            "backup": {"$ref": "opt"},
            "tags": {"$set": ["a", "b"]}
        }),
    )
    .unwrap();

    // WHEN the diff is applied to the old tree
    let diff = heuristic_diff(&store, &old, &new);
    apply_diff(&diff, &mut store, &old).unwrap();

    // THEN exporting the old tree gives the new document
    assert_eq!(
        export_json(&store, &old).unwrap(),
        json!({
            "__type__": "Trainer",
            "steps": 200,
            "optimizer": {"$id": "n1", "__type__": "Sgd", "lr": 0.1},
            "tags": {"$set": ["a", "b"]},
            "backup": {"$ref": "n1"}
        })
    );
}

#[test]
fn test_diff_json_uses_change_list() {
    // GIVEN a diff with a type change and a reference
    let mut store = NodeStore::new();
    let old = import_json(&mut store, &json!({"__type__": "A", "x": [1], "y": 2})).unwrap();
    let new = import_json(&mut store, &json!({"__type__": "B", "x": [1], "z": [1]})).unwrap();
    let diff = heuristic_diff(&store, &old, &new);

    // WHEN serialized
    let doc = serde_json::to_value(&diff).unwrap();

    // THEN changes are {path, op} entries in path order
    let paths: Vec<String> = doc["changes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|change| {
            serde_json::from_value::<Path>(change["path"].clone())
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(paths, vec![".y", ".z", ".__type__"]);
    assert_eq!(doc["changes"][0]["op"]["op"], "delete_value");

    // AND it reads back to the same diff
    let back: Diff = serde_json::from_value(doc).unwrap();
    assert_eq!(back, diff);
}
