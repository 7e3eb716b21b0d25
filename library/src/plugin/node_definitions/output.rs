use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use super::{inp, prop};
use crate::error::NodeError;
use crate::evaluation::function::{FunctionDescriptor, NodeFunction};
use crate::evaluation::value::{Data, Returned, Value};
use crate::model::node::GraphNode;
use crate::model::property::PropertyValue;
use crate::model::socket::SocketType;
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate, string_property};

/// Receives what a sink node gathered during one run.
pub trait Materializer: Send + Sync {
    /// Called once per run with every record, in call order.
    fn materialize(&self, name: &str, records: Vec<Vec<Value>>) -> Result<(), NodeError>;
}

/// Keeps the latest records per name in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMaterializer {
    records: Arc<Mutex<HashMap<String, Vec<Vec<Value>>>>>,
}

impl MemoryMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, name: &str) -> Option<Vec<Vec<Value>>> {
        self.records.lock().ok()?.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .lock()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Materializer for MemoryMaterializer {
    fn materialize(&self, name: &str, records: Vec<Vec<Value>>) -> Result<(), NodeError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| NodeError::message("materializer store is poisoned"))?;
        guard.insert(name.to_string(), records);
        Ok(())
    }
}

/// Stateful sink: collects the `data` input of every call between `start`
/// and `stop`, then hands at most `max_count` records to the materializer.
pub(super) struct Collect {
    materializer: Arc<dyn Materializer>,
}

impl Collect {
    pub(super) fn new(materializer: Arc<dyn Materializer>) -> Self {
        Self { materializer }
    }
}

const DEFAULT_MAX_COUNT: i64 = 100;

impl NodeKind for Collect {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("output.collect", "Collect", NodeCategory::Output)
            .with_inputs(vec![inp("data", SocketType::Any).required()])
            .with_properties(vec![
                prop("name", "Name", SocketType::Text, "collect".into()),
                prop(
                    "max_count",
                    "Max count",
                    SocketType::Int,
                    PropertyValue::Integer(DEFAULT_MAX_COUNT),
                ),
            ])
    }

    fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        let max_count = node
            .properties
            .get_i64("max_count")
            .unwrap_or(DEFAULT_MAX_COUNT)
            .max(0) as usize;
        let function = CollectFn {
            name: string_property(node, "name", "collect"),
            max_count,
            records: Vec::new(),
            materializer: Arc::clone(&self.materializer),
        };
        Ok(
            FunctionDescriptor::new("output.collect", Box::new(function))
                .with_socket_param(0, 1, SocketType::Any)
                .stateful(),
        )
    }
}

struct CollectFn {
    name: String,
    max_count: usize,
    records: Vec<Vec<Value>>,
    materializer: Arc<dyn Materializer>,
}

impl NodeFunction for CollectFn {
    fn call(&mut self, args: &[Data]) -> Result<Returned, NodeError> {
        self.records.push(args[0].values().to_vec());
        Ok(Returned::Nothing)
    }

    fn start(&mut self) -> Result<(), NodeError> {
        self.records.clear();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NodeError> {
        let mut records = std::mem::take(&mut self.records);
        if records.len() > self.max_count {
            warn!(
                "{}: {} records collected, keeping the first {}",
                self.name,
                records.len(),
                self.max_count
            );
            records.truncate(self.max_count);
        }
        debug!("{}: materializing {} records", self.name, records.len());
        self.materializer.materialize(&self.name, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flushes_bounded_records() {
        let store = MemoryMaterializer::new();
        let kind = Collect::new(Arc::new(store.clone()));
        let node = GraphNode::new("output.collect", "out")
            .with_property("name", "mesh")
            .with_property("max_count", 2i64);
        let mut descriptor = kind.compile(&node).unwrap();
        assert!(descriptor.is_stateful);

        let f = descriptor.function_mut();
        f.start().unwrap();
        for i in 0..3 {
            f.call(&[Data::Many(vec![Value::Int(i)])]).unwrap();
        }
        assert!(store.records("mesh").is_none());
        f.stop().unwrap();

        assert_eq!(
            store.records("mesh"),
            Some(vec![vec![Value::Int(0)], vec![Value::Int(1)]])
        );
    }

    #[test]
    fn test_start_discards_previous_run() {
        let store = MemoryMaterializer::new();
        let kind = Collect::new(Arc::new(store.clone()));
        let mut descriptor = kind.compile(&GraphNode::new("output.collect", "out")).unwrap();

        let f = descriptor.function_mut();
        f.call(&[Data::One(Value::Float(1.0))]).unwrap();
        f.start().unwrap();
        f.stop().unwrap();
        assert_eq!(store.records("collect"), Some(Vec::new()));
        assert_eq!(store.names(), vec!["collect".to_string()]);
    }
}
