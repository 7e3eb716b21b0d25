//! Generic graph node for the data-flow graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::property::{PropertyMap, PropertyValue};
use crate::model::socket::{SocketDefinition, SocketId};

/// A node instance in a user graph.
///
/// All nodes share this single structure. The `type_id` field references a
/// `NodeKind` registered in the `Registry`, which determines the node's
/// sockets, properties and compiled function.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub id: Uuid,
    /// Examples: "number.math", "flow.reroute", "output.collect"
    pub type_id: String,
    /// Display name, used in diagnostics and timing reports.
    pub name: String,
    #[serde(default)]
    pub location: (f64, f64),
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub inputs: Vec<SocketDefinition>,
    #[serde(default)]
    pub outputs: Vec<SocketDefinition>,
}

impl GraphNode {
    pub fn new(type_id: &str, name: &str) -> Self {
        Self::new_with_id(Uuid::new_v4(), type_id, name)
    }

    pub fn new_with_id(id: Uuid, type_id: &str, name: &str) -> Self {
        Self {
            id,
            type_id: type_id.to_string(),
            name: name.to_string(),
            location: (0.0, 0.0),
            properties: PropertyMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.set(key, value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.set(key, value.into());
    }

    pub fn input(&self, index: usize) -> SocketId {
        SocketId::new(self.id, index)
    }

    pub fn output(&self, index: usize) -> SocketId {
        SocketId::new(self.id, index)
    }

    /// Label used in errors and logs: "name (type_id)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.type_id)
    }
}
