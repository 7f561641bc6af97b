use cfgdelta_core::alignment::align_heuristically;
use cfgdelta_core::diff::{build_diff_from_alignment, Diff};
use cfgdelta_core::emit::{Expr, Statement};
use cfgdelta_core::model::{Node, NodeStore, Value};
use cfgdelta_core::path::{follow, Path, PathElement};
use cfgdelta_core::traversal::structurally_equal;
use std::collections::HashMap;

/// Parse a path literal, panicking on bad test input
#[allow(dead_code)]
pub fn path(text: &str) -> Path {
    Path::parse(text).expect("test path should parse")
}

/// Read the value at `text` under `root`
#[allow(dead_code)]
pub fn at(store: &NodeStore, root: &Value, text: &str) -> Value {
    cfgdelta_core::path::follow_path(store, root, &path(text)).expect("path should exist")
}

/// Diff two trees with the heuristic aligner
#[allow(dead_code)]
pub fn heuristic_diff(store: &NodeStore, old: &Value, new: &Value) -> Diff {
    let alignment = align_heuristically(store, old, new).expect("alignment should succeed");
    build_diff_from_alignment(&alignment).expect("diff should build")
}

/// Assert two values are structurally equal, printing both on failure
#[allow(dead_code)]
pub fn assert_same_tree(store: &NodeStore, actual: &Value, expected: &Value) {
    assert!(
        structurally_equal(store, actual, expected),
        "trees differ:\n  actual:   {}\n  expected: {}",
        describe(store, actual),
        describe(store, expected)
    );
}

/// Compact one-line rendering of a tree, for assertion messages
#[allow(dead_code)]
pub fn describe(store: &NodeStore, value: &Value) -> String {
    cfgdelta_core::interchange::export_json(store, value)
        .map(|doc| doc.to_string())
        .unwrap_or_else(|e| format!("<unrenderable: {}>", e))
}

/// Minimal interpreter for emitted statements, used to check that they do
/// what `apply_diff` does
#[allow(dead_code)]
pub fn run_statements(store: &mut NodeStore, root_name: &str, root: &Value, statements: &[Statement]) {
    let mut env: HashMap<String, Value> = HashMap::new();
    env.insert(root_name.to_string(), root.clone());

    for statement in statements {
        match statement {
            Statement::BindShared { name, value, .. } | Statement::BindAlias { name, value, .. } => {
                let value = eval(store, &env, value);
                env.insert(name.clone(), value);
            }
            Statement::Assign { target, value } => {
                let value = eval(store, &env, value);
                let (parent, element) = split_target(store, &env, target);
                let id = parent.node_id().expect("assignment target parent should be a node");
                match element {
                    PathElement::Attribute(name) => {
                        store.set_field(id, name, value).expect("set_field");
                    }
                    PathElement::Index(index) => {
                        store.set_item(id, *index, value).expect("set_item");
                    }
                    PathElement::Key(key) => {
                        store.set_entry(id, key.clone(), value).expect("set_entry");
                    }
                    PathElement::TypeSelector => panic!("type changes use UpdateType"),
                }
            }
            Statement::Delete { target } => {
                let (parent, element) = split_target(store, &env, target);
                let id = parent.node_id().expect("delete target parent should be a node");
                match element {
                    PathElement::Attribute(name) => {
                        store.delete_field(id, name).expect("delete_field");
                    }
                    PathElement::Key(key) => {
                        store.delete_entry(id, key).expect("delete_entry");
                    }
                    other => panic!("cannot delete {}", other),
                }
            }
            Statement::UpdateType { target, type_name } => {
                let record = eval(store, &env, target);
                let id = record.node_id().expect("type target should be a node");
                store.set_type_name(id, type_name).expect("set_type_name");
            }
        }
    }
}

fn split_target<'e>(
    store: &mut NodeStore,
    env: &HashMap<String, Value>,
    target: &'e Expr,
) -> (Value, &'e PathElement) {
    match target {
        Expr::Child { parent, element } => (eval(store, env, parent), element),
        other => panic!("{} is not assignable", other),
    }
}

fn eval(store: &mut NodeStore, env: &HashMap<String, Value>, expr: &Expr) -> Value {
    match expr {
        Expr::Var { name } => env.get(name).cloned().unwrap_or_else(|| panic!("unbound {}", name)),
        Expr::Child { parent, element } => {
            let parent = eval(store, env, parent);
            follow(store, &parent, element).expect("child should exist")
        }
        Expr::Literal { value } => Value::Leaf(value.clone()),
        Expr::Record { type_name, fields } => {
            let fields: Vec<(String, Value)> = fields
                .iter()
                .map(|(name, field)| (name.clone(), eval(store, env, field)))
                .collect();
            store.record(type_name, fields)
        }
        Expr::Sequence { items } => {
            let items: Vec<Value> = items.iter().map(|item| eval(store, env, item)).collect();
            store.sequence(items)
        }
        Expr::Mapping { entries } => {
            let entries: Vec<_> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), eval(store, env, entry)))
                .collect();
            store.mapping(entries)
        }
        Expr::Set { members } => Value::Node(store.insert(Node::Set(members.clone()))),
    }
}
