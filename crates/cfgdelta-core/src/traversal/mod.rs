//! Graph walks over the node arena

pub mod copy;
pub mod equality;
pub mod walk;

pub use copy::deep_copy;
pub use equality::structurally_equal;
pub use walk::{child_nodes, for_each_path, multi_path_nodes, paths_by_node, Reachable};
