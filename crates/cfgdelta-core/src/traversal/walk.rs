use std::collections::{HashMap, HashSet};

use crate::errors::Result;
use crate::model::{Node, NodeId, NodeStore, Value};
use crate::path::{Path, PathElement};

/// Node-valued children of a node, in field/item/entry order
///
/// Leaves and set members are not children: they have no identity.
pub fn child_nodes(node: &Node) -> Vec<(PathElement, NodeId)> {
    match node {
        Node::Record(record) => record
            .fields()
            .filter_map(|(name, value)| {
                value
                    .node_id()
                    .map(|id| (PathElement::Attribute(name.to_string()), id))
            })
            .collect(),
        Node::Sequence(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, value)| value.node_id().map(|id| (PathElement::Index(i), id)))
            .collect(),
        Node::Mapping(entries) => entries
            .iter()
            .filter_map(|(key, value)| value.node_id().map(|id| (PathElement::Key(key.clone()), id)))
            .collect(),
        Node::Set(_) => Vec::new(),
    }
}

/// Every node reachable from `root` with the first path a pre-order
/// depth-first walk finds for it
#[derive(Debug, Clone, Default)]
pub struct Reachable {
    order: Vec<NodeId>,
    paths: HashMap<NodeId, Path>,
}

impl Reachable {
    /// Walk from `root`; a leaf root reaches nothing
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if a handle in the graph is dangling.
    pub fn walk(store: &NodeStore, root: &Value) -> Result<Self> {
        let mut reachable = Reachable::default();
        let Some(root) = root.node_id() else {
            return Ok(reachable);
        };

        let mut stack = vec![(root, Path::root())];
        while let Some((id, path)) = stack.pop() {
            if reachable.paths.contains_key(&id) {
                continue;
            }
            let children = child_nodes(store.get(id)?);
            for (element, child) in children.into_iter().rev() {
                if !reachable.paths.contains_key(&child) {
                    stack.push((child, path.child(element)));
                }
            }
            reachable.order.push(id);
            reachable.paths.insert(id, path);
        }
        Ok(reachable)
    }

    /// Nodes in pre-order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.paths.contains_key(&id)
    }

    pub fn canonical_path(&self, id: NodeId) -> Option<&Path> {
        self.paths.get(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Nodes reachable from `root` by more than one path.
///
/// A node is multi-path if it has two or more incoming edges (the root
/// counts as one) or if any of its parents is multi-path. Edge counting
/// keeps this finite on cyclic graphs.
///
/// # Errors
///
/// Returns `NodeNotFound` if a handle in the graph is dangling.
pub fn multi_path_nodes(store: &NodeStore, root: &Value) -> Result<HashSet<NodeId>> {
    let reachable = Reachable::walk(store, root)?;
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    let mut edges: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    if let Some(root) = root.node_id() {
        *in_degree.entry(root).or_default() += 1;
    }
    for &id in reachable.order() {
        let children: Vec<NodeId> = child_nodes(store.get(id)?)
            .into_iter()
            .map(|(_, child)| child)
            .collect();
        for &child in &children {
            *in_degree.entry(child).or_default() += 1;
        }
        edges.insert(id, children);
    }

    let mut multi: HashSet<NodeId> = in_degree
        .iter()
        .filter_map(|(&id, &count)| (count >= 2).then_some(id))
        .collect();
    let mut pending: Vec<NodeId> = multi.iter().copied().collect();
    while let Some(id) = pending.pop() {
        for &child in edges.get(&id).map(Vec::as_slice).unwrap_or_default() {
            if multi.insert(child) {
                pending.push(child);
            }
        }
    }
    Ok(multi)
}

/// Visit every acyclic path from `root` to a node, in depth-first order.
///
/// A node shared by several parents is visited once per path. The number of
/// paths can grow exponentially with the amount of sharing.
///
/// # Errors
///
/// Returns `NodeNotFound` if a handle in the graph is dangling.
pub fn for_each_path<F>(store: &NodeStore, root: &Value, mut visit: F) -> Result<()>
where
    F: FnMut(&Path, NodeId),
{
    fn descend<F: FnMut(&Path, NodeId)>(
        store: &NodeStore,
        id: NodeId,
        path: &mut Path,
        on_path: &mut HashSet<NodeId>,
        visit: &mut F,
    ) -> Result<()> {
        visit(path, id);
        on_path.insert(id);
        for (element, child) in child_nodes(store.get(id)?) {
            if on_path.contains(&child) {
                continue;
            }
            path.push(element);
            descend(store, child, path, on_path, visit)?;
            path.pop();
        }
        on_path.remove(&id);
        Ok(())
    }

    if let Some(root) = root.node_id() {
        descend(store, root, &mut Path::root(), &mut HashSet::new(), &mut visit)?;
    }
    Ok(())
}

/// All acyclic paths to each reachable node, nodes in first-visit order
///
/// # Errors
///
/// Returns `NodeNotFound` if a handle in the graph is dangling.
pub fn paths_by_node(store: &NodeStore, root: &Value) -> Result<indexmap::IndexMap<NodeId, Vec<Path>>> {
    let mut by_node: indexmap::IndexMap<NodeId, Vec<Path>> = indexmap::IndexMap::new();
    for_each_path(store, root, |path, id| {
        by_node.entry(id).or_default().push(path.clone());
    })?;
    Ok(by_node)
}
