//! User-authored node graph: introspection and mutation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::GraphNode;
use super::socket::{Link, SocketDefinition, SocketId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeGraph {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl NodeGraph {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn load(json_str: &str) -> Result<Self, serde_json::Error> {
        let graph: NodeGraph = serde_json::from_str(json_str)?;

        Ok(graph)
    }

    pub fn save(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Adds a node and returns its id.
    pub fn add_node(&mut self, node: GraphNode) -> Uuid {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn get_node(&self, id: Uuid) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn get_node_mut(&mut self, id: Uuid) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Links `from` (output) to `to` (input).
    ///
    /// An input accepts at most one link, so any existing link into `to` is
    /// replaced.
    pub fn add_link(&mut self, from: SocketId, to: SocketId) {
        self.links.retain(|l| l.to != to);
        self.links.push(Link::new(from, to));
    }

    pub fn remove_link(&mut self, from: SocketId, to: SocketId) -> Option<Link> {
        let index = self
            .links
            .iter()
            .position(|l| l.from == from && l.to == to)?;
        Some(self.links.remove(index))
    }

    pub fn set_location(&mut self, id: Uuid, location: (f64, f64)) {
        if let Some(node) = self.get_node_mut(id) {
            node.location = location;
        }
    }

    pub fn input_socket(&self, socket: SocketId) -> Option<&SocketDefinition> {
        self.get_node(socket.node_id)?.inputs.get(socket.index)
    }

    pub fn output_socket(&self, socket: SocketId) -> Option<&SocketDefinition> {
        self.get_node(socket.node_id)?.outputs.get(socket.index)
    }

    /// Checks the link flag and that both endpoints still exist.
    pub fn link_is_valid(&self, link: &Link) -> Result<(), String> {
        if !link.is_valid {
            return Err("link flagged invalid".to_string());
        }
        if self.output_socket(link.from).is_none() {
            return Err(format!(
                "source socket {}:{} does not exist",
                link.from.node_id, link.from.index
            ));
        }
        if self.input_socket(link.to).is_none() {
            return Err(format!(
                "destination socket {}:{} does not exist",
                link.to.node_id, link.to.index
            ));
        }
        Ok(())
    }

    /// The output socket feeding an input, if any.
    pub fn upstream(&self, input: SocketId) -> Option<SocketId> {
        self.links.iter().find(|l| l.to == input).map(|l| l.from)
    }

    /// All input sockets fed by an output (fan-out).
    pub fn downstream(&self, output: SocketId) -> Vec<SocketId> {
        self.links
            .iter()
            .filter(|l| l.from == output)
            .map(|l| l.to)
            .collect()
    }

    /// Whether any link touches the socket, on either end.
    pub fn is_linked(&self, socket: SocketId) -> bool {
        self.is_input_linked(socket) || self.is_output_linked(socket)
    }

    pub fn is_input_linked(&self, input: SocketId) -> bool {
        self.links.iter().any(|l| l.to == input)
    }

    pub fn is_output_linked(&self, output: SocketId) -> bool {
        self.links.iter().any(|l| l.from == output)
    }
}
