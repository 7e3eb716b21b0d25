//! Built-in node kinds.

mod convert;
mod flow;
mod list;
mod matrix;
mod number;
mod output;
mod vector;

use std::sync::Arc;

use crate::model::property::{PropertyDefinition, PropertyValue};
use crate::model::socket::{SocketDefinition, SocketType};
use crate::plugin::conversion::ConversionRegistry;
use crate::plugin::node_types::NodeKind;

pub use output::{Materializer, MemoryMaterializer};

/// Every built-in kind. Sinks hand their records to `materializer`.
pub(crate) fn builtin_kinds(materializer: Arc<dyn Materializer>) -> Vec<Arc<dyn NodeKind>> {
    let mut kinds: Vec<Arc<dyn NodeKind>> = vec![
        Arc::new(number::Constant),
        Arc::new(number::Integer),
        Arc::new(number::Sequence),
        Arc::new(number::Math),
        Arc::new(list::Repeat),
        Arc::new(vector::VectorMath),
        Arc::new(matrix::Transform),
        Arc::new(output::Collect::new(materializer)),
        Arc::new(flow::Reroute),
    ];
    for adapter in convert::adapters() {
        kinds.push(Arc::new(adapter));
    }
    kinds
}

pub(crate) fn builtin_conversions(registry: &mut ConversionRegistry) {
    convert::register_conversions(registry);
}

// ---------------------------------------------------------------------------
// Socket helpers
// ---------------------------------------------------------------------------

fn inp(name: &str, socket_type: SocketType) -> SocketDefinition {
    SocketDefinition::new(name, socket_type)
}

fn out(name: &str, socket_type: SocketType) -> SocketDefinition {
    SocketDefinition::new(name, socket_type)
}

fn prop(name: &str, label: &str, property_type: SocketType, default: PropertyValue) -> PropertyDefinition {
    PropertyDefinition::new(name, label, property_type, default)
}
