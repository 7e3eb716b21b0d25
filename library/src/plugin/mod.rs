//! Node kind registry.
//!
//! A `Registry` is built once at startup, holds every node kind keyed by its
//! type id together with the implicit type conversions, and is passed by
//! reference to whatever needs to instantiate or compile nodes.

pub mod conversion;
pub mod node_definitions;
pub mod node_types;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::ExecutionError;
use crate::evaluation::function::FunctionDescriptor;
use crate::model::node::GraphNode;
use crate::model::socket::{SocketDefinition, SocketType};
use conversion::{Conversion, ConversionRegistry};
use node_definitions::{Materializer, MemoryMaterializer};
use node_types::{NodeKind, NodeTemplate};

#[derive(Default)]
pub struct Registry {
    kinds: HashMap<String, Arc<dyn NodeKind>>,
    conversions: ConversionRegistry,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in kinds with sinks writing to an in-memory store.
    pub fn with_builtin() -> Self {
        Self::builtin_with(Arc::new(MemoryMaterializer::new()))
    }

    pub fn builtin_with(materializer: Arc<dyn Materializer>) -> Self {
        let mut registry = Self::new();
        for kind in node_definitions::builtin_kinds(materializer) {
            registry.register(kind);
        }
        node_definitions::builtin_conversions(&mut registry.conversions);
        registry
    }

    /// Registers (or replaces) a kind under its template's type id.
    pub fn register(&mut self, kind: Arc<dyn NodeKind>) {
        let type_id = kind.template().type_id;
        if self.kinds.insert(type_id.clone(), kind).is_some() {
            debug!("Node kind {} replaced", type_id);
        }
    }

    pub fn register_conversion(&mut self, from: SocketType, to: SocketType, conversion: Conversion) {
        self.conversions.register(from, to, conversion);
    }

    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    pub fn kind(&self, type_id: &str) -> Result<&Arc<dyn NodeKind>, ExecutionError> {
        self.kinds
            .get(type_id)
            .ok_or_else(|| ExecutionError::UnknownNodeType(type_id.to_string()))
    }

    pub fn template(&self, type_id: &str) -> Result<NodeTemplate, ExecutionError> {
        Ok(self.kind(type_id)?.template())
    }

    pub fn is_passthrough(&self, type_id: &str) -> bool {
        self.kinds.get(type_id).is_some_and(|k| k.is_passthrough())
    }

    /// Registered type ids, sorted.
    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.kinds.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Instantiates a node of `type_id` with default properties and sockets.
    pub fn create_node(&self, type_id: &str) -> Result<GraphNode, ExecutionError> {
        let kind = self.kind(type_id)?;
        let template = kind.template();
        let mut node = GraphNode::new(type_id, &template.display_name);
        node.properties = template.default_property_map();
        let (inputs, outputs) = kind.sockets(&node.properties);
        node.inputs = inputs;
        node.outputs = outputs;
        Ok(node)
    }

    /// Re-derives a node's sockets from its current properties.
    ///
    /// Sockets whose name and type are unchanged keep their stored default.
    /// Returns whether anything changed. Links into removed sockets become
    /// dangling and are rejected by the next run.
    pub fn adjust_sockets(&self, node: &mut GraphNode) -> Result<bool, ExecutionError> {
        let kind = self.kind(&node.type_id)?;
        let (inputs, outputs) = kind.sockets(&node.properties);
        let changed_in = merge_sockets(&mut node.inputs, inputs);
        let changed_out = merge_sockets(&mut node.outputs, outputs);
        if changed_in || changed_out {
            debug!(
                "Adjusted sockets of {}: {} inputs, {} outputs",
                node.label(),
                node.inputs.len(),
                node.outputs.len()
            );
        }
        Ok(changed_in || changed_out)
    }

    /// Resolves a node to its function descriptor.
    pub fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, ExecutionError> {
        self.kind(&node.type_id)?
            .compile(node)
            .map_err(|e| ExecutionError::node_evaluation(node.label(), e))
    }
}

fn merge_sockets(current: &mut Vec<SocketDefinition>, wanted: Vec<SocketDefinition>) -> bool {
    let mut changed = current.len() != wanted.len();
    let merged: Vec<SocketDefinition> = wanted
        .into_iter()
        .enumerate()
        .map(|(i, socket)| match current.get(i) {
            Some(existing)
                if existing.name == socket.name && existing.socket_type == socket.socket_type =>
            {
                existing.clone()
            }
            _ => {
                changed = true;
                socket
            }
        })
        .collect();
    *current = merged;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::property::PropertyValue;

    #[test]
    fn test_create_node_uses_template() {
        let registry = Registry::with_builtin();
        let node = registry.create_node("number.math").unwrap();
        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.outputs.len(), 1);
        assert_eq!(node.properties.get_string("mode").as_deref(), Some("add"));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let registry = Registry::with_builtin();
        assert!(matches!(
            registry.create_node("number.pow"),
            Err(ExecutionError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_adjust_sockets_after_mode_change() {
        let registry = Registry::with_builtin();
        let mut node = registry.create_node("number.math").unwrap();
        node.inputs[0].default = Some(PropertyValue::from(5.0));

        node.set_property("mode", "negate");
        assert!(registry.adjust_sockets(&mut node).unwrap());
        assert_eq!(node.inputs.len(), 1);
        // Same name and type: the edited default survives.
        assert_eq!(node.inputs[0].default, Some(PropertyValue::from(5.0)));

        assert!(!registry.adjust_sockets(&mut node).unwrap());

        node.set_property("mode", "as_int");
        assert!(registry.adjust_sockets(&mut node).unwrap());
        assert_eq!(node.outputs[0].socket_type, SocketType::Int);
    }

    #[test]
    fn test_builtin_conversions_present() {
        let registry = Registry::with_builtin();
        let conversions = registry.conversions();
        assert!(conversions.get_conversion(SocketType::Int, SocketType::Float).is_some());
        assert!(conversions.get_conversion(SocketType::Text, SocketType::Float).is_none());
        for conversion in [
            conversions.get_conversion(SocketType::Float, SocketType::Vector),
            conversions.get_conversion(SocketType::Bool, SocketType::Float),
        ] {
            let adapter = conversion.unwrap();
            assert!(registry.kind(&adapter.adapter_type).is_ok());
        }
    }

    #[test]
    fn test_reroute_is_passthrough() {
        let registry = Registry::with_builtin();
        assert!(registry.is_passthrough("flow.reroute"));
        assert!(!registry.is_passthrough("number.math"));
        assert!(!registry.is_passthrough("missing"));
    }
}
