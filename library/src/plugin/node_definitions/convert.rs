//! Implicit adapters spliced into links whose socket types differ.

use super::{inp, out};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::{Returned, Value};
use crate::model::node::GraphNode;
use crate::model::socket::SocketType;
use crate::plugin::conversion::{Conversion, ConversionRegistry};
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate};

pub(super) struct Adapter {
    type_id: &'static str,
    display_name: &'static str,
    from: SocketType,
    to: SocketType,
    convert: fn(&Value) -> Option<Value>,
}

impl NodeKind for Adapter {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new(self.type_id, self.display_name, NodeCategory::Convert)
            .with_inputs(vec![inp("value", self.from)])
            .with_outputs(vec![out("value", self.to)])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        let convert = self.convert;
        let to = self.to;
        Ok(FunctionDescriptor::pure(self.type_id, move |args| {
            let value = args[0].value(0)?;
            convert(value).map(Returned::one).ok_or_else(|| {
                NodeError::invalid_input(0, format!("cannot convert {} to {:?}", value, to))
            })
        })
        .with_socket_param(0, 0, self.from)
        .with_return(self.to, 0))
    }
}

fn int_to_float(v: &Value) -> Option<Value> {
    match v {
        Value::Int(i) => Some(Value::Float(*i as f64)),
        _ => v.as_float().map(Value::Float),
    }
}

fn bool_to_float(v: &Value) -> Option<Value> {
    v.as_float().map(Value::Float)
}

/// Truncates toward zero.
fn float_to_int(v: &Value) -> Option<Value> {
    v.as_float().map(|f| Value::Int(f.trunc() as i64))
}

fn float_to_vector(v: &Value) -> Option<Value> {
    v.as_float().map(|f| Value::Vector([f, f, f]))
}

pub(super) fn adapters() -> Vec<Adapter> {
    use SocketType::*;
    vec![
        Adapter {
            type_id: "convert.int_to_float",
            display_name: "Int to Float",
            from: Int,
            to: Float,
            convert: int_to_float,
        },
        Adapter {
            type_id: "convert.bool_to_float",
            display_name: "Bool to Float",
            from: Bool,
            to: Float,
            convert: bool_to_float,
        },
        Adapter {
            type_id: "convert.float_to_int",
            display_name: "Float to Int",
            from: Float,
            to: Int,
            convert: float_to_int,
        },
        Adapter {
            type_id: "convert.float_to_vector",
            display_name: "Float to Vector",
            from: Float,
            to: Vector,
            convert: float_to_vector,
        },
    ]
}

pub(super) fn register_conversions(registry: &mut ConversionRegistry) {
    for adapter in adapters() {
        registry.register(adapter.from, adapter.to, Conversion::new(adapter.type_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::value::Data;

    #[test]
    fn test_every_adapter_is_registered() {
        let mut registry = ConversionRegistry::new();
        register_conversions(&mut registry);
        assert_eq!(registry.len(), adapters().len());
        for adapter in adapters() {
            let conversion = registry.get_conversion(adapter.from, adapter.to).unwrap();
            assert_eq!(conversion.adapter_type, adapter.type_id);
        }
    }

    #[test]
    fn test_float_to_int_truncates() {
        assert_eq!(float_to_int(&Value::Float(-2.7)), Some(Value::Int(-2)));
        assert_eq!(
            float_to_vector(&Value::Float(0.5)),
            Some(Value::Vector([0.5, 0.5, 0.5]))
        );
    }

    #[test]
    fn test_adapter_rejects_unconvertible_payload() {
        let adapter = adapters().remove(0);
        let mut descriptor = adapter.compile(&GraphNode::new(adapter.type_id, "a")).unwrap();
        let err = descriptor
            .function_mut()
            .call(&[Data::One(Value::Text("x".to_string()))])
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { index: 0, .. }));
    }
}
