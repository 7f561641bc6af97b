use std::collections::HashSet;

use crate::model::{Node, NodeId, NodeStore, Value};

/// Deep structural equality of two values in one store.
///
/// Node identity is ignored; record types, field sets, items, entries and
/// set members must match and leaves must be equal scalars of the same kind.
/// Pairs under comparison are assumed equal when re-entered, so cyclic
/// graphs compare in finite time.
pub fn structurally_equal(store: &NodeStore, a: &Value, b: &Value) -> bool {
    let mut assumed = HashSet::new();
    values_equal(store, a, b, &mut assumed)
}

fn values_equal(
    store: &NodeStore,
    a: &Value,
    b: &Value,
    assumed: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Value::Leaf(x), Value::Leaf(y)) => x.same_as(y),
        (Value::Node(x), Value::Node(y)) => {
            if x == y || !assumed.insert((*x, *y)) {
                return true;
            }
            match (store.get(*x), store.get(*y)) {
                (Ok(nx), Ok(ny)) => nodes_equal(store, nx, ny, assumed),
                _ => false,
            }
        }
        _ => false,
    }
}

fn nodes_equal(
    store: &NodeStore,
    a: &Node,
    b: &Node,
    assumed: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Node::Record(x), Node::Record(y)) => {
            x.type_name() == y.type_name()
                && x.len() == y.len()
                && x.fields().all(|(name, value)| {
                    y.get(name)
                        .is_some_and(|other| values_equal(store, value, other, assumed))
                })
        }
        (Node::Sequence(x), Node::Sequence(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(p, q)| values_equal(store, p, q, assumed))
        }
        (Node::Mapping(x), Node::Mapping(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, value)| {
                    y.get(key)
                        .is_some_and(|other| values_equal(store, value, other, assumed))
                })
        }
        (Node::Set(x), Node::Set(y)) => x == y,
        _ => false,
    }
}
