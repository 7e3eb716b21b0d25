use thiserror::Error;
use uuid::Uuid;

use crate::model::socket::SocketType;

/// Failure raised by a node function while it is being invoked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("invalid input for parameter {index}: {reason}")]
    InvalidInput { index: usize, reason: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("return value does not match declared outputs: {0}")]
    ReturnShape(String),
    #[error("{0}")]
    Message(String),
}

impl NodeError {
    pub fn invalid_input(index: usize, reason: impl Into<String>) -> Self {
        NodeError::InvalidInput {
            index,
            reason: reason.into(),
        }
    }

    pub fn return_shape(msg: impl Into<String>) -> Self {
        NodeError::ReturnShape(msg.into())
    }

    pub fn message(msg: impl Into<String>) -> Self {
        NodeError::Message(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("graph contains an invalid link (#{link}): {reason}")]
    GraphInvalid { link: usize, reason: String },
    #[error("dependency cycle detected at node {node}")]
    GraphCycle { node: String },
    #[error("no conversion from {from:?} to {to:?} for input {socket} of node {node}")]
    MissingConversion {
        from: SocketType,
        to: SocketType,
        node: String,
        socket: String,
    },
    #[error("required input {socket} of node {node} is not connected")]
    RequiredInputUnconnected { node: String, socket: String },
    #[error("node {node} failed: {source}")]
    NodeEvaluation {
        node: String,
        #[source]
        source: NodeError,
    },
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("Node not found: {0}")]
    NodeNotFound(Uuid),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl ExecutionError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ExecutionError::InvalidArgument(msg.into())
    }

    pub fn node_evaluation(node: impl Into<String>, source: NodeError) -> Self {
        ExecutionError::NodeEvaluation {
            node: node.into(),
            source,
        }
    }
}
