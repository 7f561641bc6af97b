pub mod node;
pub mod schema;
pub mod store;

pub use node::{Key, Node, NodeId, NodeKind, Record, Scalar, Value};
pub use schema::TypeSchema;
pub use store::NodeStore;
