pub mod graph;
pub mod node;
pub mod property;
pub mod socket;

pub use graph::NodeGraph;
pub use node::GraphNode;
pub use property::{PropertyDefinition, PropertyMap, PropertyValue};
pub use socket::{Link, SocketDefinition, SocketId, SocketType};
