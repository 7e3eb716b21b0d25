//! Socket and link model for the data-flow graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::property::PropertyValue;

/// Declared data type of a socket or parameter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SocketType {
    /// Floating point scalar (f64)
    Float,
    /// Integer value (i64)
    Int,
    /// Boolean value
    Bool,
    /// 3D vector / vertex
    Vector,
    /// 4x4 transform matrix
    Matrix,
    /// Text string
    Text,
    /// Opaque list payload (property arrays)
    List,
    /// Accepts any type (generic)
    Any,
}

impl SocketType {
    /// Whether a value of `self` can be fed into a socket of `other` unchanged.
    pub fn is_compatible(self, other: SocketType) -> bool {
        self == other || self == SocketType::Any || other == SocketType::Any
    }
}

/// Definition of a socket on a node instance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SocketDefinition {
    pub name: String,
    pub socket_type: SocketType,
    /// Value used when an input is left unconnected.
    #[serde(default)]
    pub default: Option<PropertyValue>,
    /// Required inputs must be connected for the node to run.
    #[serde(default)]
    pub required: bool,
}

impl SocketDefinition {
    pub fn new(name: &str, socket_type: SocketType) -> Self {
        Self {
            name: name.to_string(),
            socket_type,
            default: None,
            required: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Identifies a specific socket on a specific node.
///
/// Whether the index addresses an input or an output follows from where the
/// id is used: `Link::from` is always an output, `Link::to` always an input.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketId {
    pub node_id: Uuid,
    pub index: usize,
}

impl SocketId {
    pub fn new(node_id: Uuid, index: usize) -> Self {
        Self { node_id, index }
    }
}

/// A directed edge from an output socket to an input socket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Link {
    pub from: SocketId,
    pub to: SocketId,
    /// Cleared by the editor when one of the endpoints dangles.
    #[serde(default = "default_valid")]
    pub is_valid: bool,
}

fn default_valid() -> bool {
    true
}

impl Link {
    pub fn new(from: SocketId, to: SocketId) -> Self {
        Self {
            from,
            to,
            is_valid: true,
        }
    }
}
