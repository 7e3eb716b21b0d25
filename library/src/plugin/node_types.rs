//! Node kind definitions for the data-flow graph.

use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::model::node::GraphNode;
use crate::model::property::{PropertyDefinition, PropertyMap, PropertyValue};
use crate::model::socket::SocketDefinition;

/// Category of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Scalar sources and arithmetic (constant, sequence, math)
    Number,
    /// Sequence reshaping (repeat, tile)
    List,
    /// Vector arithmetic
    Vector,
    /// Matrix operations (transform)
    Matrix,
    /// Sinks that hand results to an external collaborator
    Output,
    /// Graph plumbing (reroute)
    Flow,
    /// Implicit type adapters
    Convert,
    /// Kinds registered by an embedding application
    Custom,
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeCategory::Number => "Number",
            NodeCategory::List => "List",
            NodeCategory::Vector => "Vector",
            NodeCategory::Matrix => "Matrix",
            NodeCategory::Output => "Output",
            NodeCategory::Flow => "Flow",
            NodeCategory::Convert => "Convert",
            NodeCategory::Custom => "Custom",
        };
        write!(f, "{}", s)
    }
}

/// What a node of a given kind looks like: its sockets, default properties,
/// and metadata. Node instances are `GraphNode` values whose `type_id`
/// references the kind.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    /// Unique type identifier (e.g. "number.math", "flow.reroute")
    pub type_id: String,
    pub display_name: String,
    pub category: NodeCategory,
    pub description: String,
    pub inputs: Vec<SocketDefinition>,
    pub outputs: Vec<SocketDefinition>,
    pub default_properties: Vec<PropertyDefinition>,
}

impl NodeTemplate {
    pub fn new(type_id: &str, display_name: &str, category: NodeCategory) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            default_properties: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<SocketDefinition>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<SocketDefinition>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_properties(mut self, props: Vec<PropertyDefinition>) -> Self {
        self.default_properties = props;
        self
    }

    pub fn default_property(&self, name: &str) -> Option<&PropertyValue> {
        self.default_properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.default_value)
    }

    /// Property map holding every declared default.
    pub fn default_property_map(&self) -> PropertyMap {
        self.default_properties
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }
}

/// Behaviour of one node kind, registered in the `Registry`.
pub trait NodeKind: Send + Sync {
    fn template(&self) -> NodeTemplate;

    /// Input and output sockets for a node with the given properties.
    ///
    /// Kinds whose signature depends on a property (a math node's `mode`)
    /// override this; the rest use the template's sockets.
    fn sockets(&self, _properties: &PropertyMap) -> (Vec<SocketDefinition>, Vec<SocketDefinition>) {
        let template = self.template();
        (template.inputs, template.outputs)
    }

    /// Resolves a node instance to its function descriptor.
    fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, NodeError>;

    /// Passthrough kinds are removed from the graph before execution.
    fn is_passthrough(&self) -> bool {
        false
    }
}

/// Reads a string property, falling back to `default` when absent.
pub(crate) fn string_property(node: &GraphNode, name: &str, default: &str) -> String {
    node.properties
        .get_string(name)
        .unwrap_or_else(|| default.to_string())
}
