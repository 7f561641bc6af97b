#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cfgdelta_core::apply::apply_diff;
use cfgdelta_core::diff::{Diff, DiffOperation, DiffValue, Reference};
use cfgdelta_core::emit::{emit_resolved_statements, emit_statements, EmitOptions, Statement};
use cfgdelta_core::model::{NodeStore, Value};
use cfgdelta_core::resolve::resolve_diff_references;
use cfgdelta_core::traversal::deep_copy;
use common::{assert_same_tree, at, heuristic_diff, path, run_statements};

fn shared_tree(store: &mut NodeStore) -> (Value, Value) {
    let z12 = store.sequence([Value::from(12i64)]);
    let old_y = store.record("SimpleClass", [("x", Value::from(2i64)), ("z", z12.clone())]);
    let old = store.record("SimpleClass", [("x", Value::from(1i64)), ("y", old_y)]);

    let pair = store.sequence([Value::from(3i64), Value::from(4i64)]);
    let new_x = store.sequence([Value::from(1i64), pair, z12.clone()]);
    let new_y = store.record("SimpleClass", [("x", new_x.clone()), ("z", z12)]);
    let new = store.record("SimpleClass", [("x", new_x), ("y", new_y)]);
    (old, new)
}

#[test]
fn test_statements_reproduce_apply() {
    // GIVEN a diff with shared values and old references
    let mut store = NodeStore::new();
    let (old, new) = shared_tree(&mut store);
    let expected = deep_copy(&mut store, &new).unwrap();
    let diff = heuristic_diff(&store, &old, &new);

    // WHEN the emitted statements are executed against the old tree
    let statements = emit_statements(&diff, &store, Some(&old), &EmitOptions::default()).unwrap();
    run_statements(&mut store, "cfg", &old, &statements);

    // THEN the result equals the new tree and keeps its sharing
    assert_same_tree(&store, &old, &expected);
    assert_eq!(at(&store, &old, ".x"), at(&store, &old, ".y.x"));
}

#[test]
fn test_shared_value_holding_moved_old_node() {
    // GIVEN Root(a=[1], b=[2]) and a diff where a new shared sequence holds
    // the old `.a` while `.a` itself is overwritten by the old `.b`
    let mut store = NodeStore::new();
    let a = store.sequence([Value::from(1i64)]);
    let b = store.sequence([Value::from(2i64)]);
    let old = store.record("Root", [("a", a.clone()), ("b", b.clone())]);
    let shared: DiffValue = Reference::new_shared(0).into();
    let diff = Diff::new(
        [
            (path(".a"), DiffOperation::modify(Reference::old(path(".b")))),
            (path(".b"), DiffOperation::modify(shared.clone())),
            (path(".c"), DiffOperation::set(shared)),
        ]
        .into_iter()
        .collect(),
        vec![DiffValue::Sequence {
            items: vec![Reference::old(path(".a")).into()],
        }],
    );
    let mut applied_store = store.clone();
    apply_diff(&diff, &mut applied_store, &old).unwrap();

    // WHEN the emitted statements are executed against the old tree
    let statements = emit_statements(&diff, &store, Some(&old), &EmitOptions::default()).unwrap();
    run_statements(&mut store, "cfg", &old, &statements);

    // THEN they agree with apply_diff, node identity included
    assert_eq!(at(&store, &old, ".a"), b);
    assert_eq!(at(&store, &old, ".b[0]"), a);
    assert_eq!(at(&store, &old, ".b"), at(&store, &old, ".c"));
    assert_eq!(at(&applied_store, &old, ".b[0]"), a);
    assert_eq!(
        common::describe(&store, &old),
        common::describe(&applied_store, &old)
    );
}

#[test]
fn test_shared_bindings_come_first() {
    // GIVEN a diff with shared values
    let mut store = NodeStore::new();
    let (old, new) = shared_tree(&mut store);
    let diff = heuristic_diff(&store, &old, &new);

    // WHEN emitting
    let statements = emit_statements(&diff, &store, Some(&old), &EmitOptions::default()).unwrap();

    // THEN one binding per shared value leads, in index order
    let indices: Vec<usize> = statements
        .iter()
        .take(diff.new_shared_values.len())
        .map(|statement| match statement {
            Statement::BindShared { index, .. } => *index,
            other => panic!("expected a shared binding, got {}", other),
        })
        .collect();
    assert_eq!(indices, (0..diff.new_shared_values.len()).collect::<Vec<_>>());
}

#[test]
fn test_child_parent_swap_statements() {
    // GIVEN [Parent(x=Child())] and a diff that swaps the two
    let mut store = NodeStore::new();
    let child = store.record("Child", Vec::<(String, Value)>::new());
    let parent = store.record("Parent", [("x", child.clone())]);
    let old = store.sequence([parent.clone()]);
    let diff = Diff::from_changes([
        (path("[0]"), DiffOperation::modify(Reference::old(path("[0].x")))),
        (path("[0].x"), DiffOperation::DeleteValue),
        (path("[0].x.x"), DiffOperation::set(Reference::old(path("[0]")))),
    ]);

    // WHEN emitting and running the statements
    let statements = emit_statements(&diff, &store, Some(&old), &EmitOptions::default()).unwrap();
    let rendered: Vec<String> = statements.iter().map(ToString::to_string).collect();
    run_statements(&mut store, "cfg", &old, &statements);

    // THEN moved values are read through aliases bound up front
    assert_eq!(
        rendered,
        vec![
            "moved_cfg_0 = cfg[0]",
            "moved_cfg_0_x = cfg[0].x",
            "cfg[0] = moved_cfg_0_x",
            "del moved_cfg_0.x",
            "moved_cfg_0_x.x = moved_cfg_0",
        ]
    );
    assert_eq!(at(&store, &old, "[0]"), child);
    assert_eq!(at(&store, &old, "[0].x"), parent);
}

#[test]
fn test_resolved_diff_emits_same_statements() {
    // GIVEN a diff and its resolved form
    let mut store = NodeStore::new();
    let (old, new) = shared_tree(&mut store);
    let diff = heuristic_diff(&store, &old, &new);
    let direct = emit_statements(&diff, &store, Some(&old), &EmitOptions::default()).unwrap();

    let mut work = store.clone();
    let resolved = resolve_diff_references(&diff, &mut work, &old).unwrap();

    // WHEN emitting from the resolved diff
    let from_resolved = emit_resolved_statements(&resolved, &work, &old, &EmitOptions::default()).unwrap();

    // THEN running either list yields the same tree
    let expected = deep_copy(&mut store, &new).unwrap();
    let mut first = store.clone();
    run_statements(&mut first, "cfg", &old, &direct);
    assert_same_tree(&first, &old, &expected);
    run_statements(&mut work, "cfg", &old, &from_resolved);
    let expected_in_work = deep_copy(&mut work, &new).unwrap();
    assert_same_tree(&work, &old, &expected_in_work);
}

#[test]
fn test_reserved_names_are_avoided() {
    // GIVEN a root name and a reserved identifier that aliases would want
    let diff = Diff::from_changes([
        (path(".a"), DiffOperation::modify(Reference::old(path(".b")))),
        (path(".b"), DiffOperation::modify(Reference::old(path(".a")))),
    ]);
    let mut store = NodeStore::new();
    let a = store.sequence([]);
    let b = store.sequence([Value::from(1i64)]);
    let old = store.record("Root", [("a", a), ("b", b)]);
    let options = EmitOptions::default()
        .with_root_name("conf")
        .with_reserved(["moved_conf_a"]);

    // WHEN emitting
    let statements = emit_statements(&diff, &store, Some(&old), &options).unwrap();

    // THEN the reserved name gets a numeric suffix
    assert_eq!(statements[0].to_string(), "moved_conf_a_2 = conf.a");
    assert_eq!(statements[1].to_string(), "moved_conf_b = conf.b");
}
