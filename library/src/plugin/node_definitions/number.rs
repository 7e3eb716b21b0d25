use super::{inp, out, prop};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::{Data, Returned, Value};
use crate::model::node::GraphNode;
use crate::model::property::{PropertyMap, PropertyValue};
use crate::model::socket::{SocketDefinition, SocketType};
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate, string_property};

/// Emits its `value` property as a single float.
pub(super) struct Constant;

impl NodeKind for Constant {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("number.constant", "Constant", NodeCategory::Number)
            .with_outputs(vec![out("value", SocketType::Float)])
            .with_properties(vec![prop("value", "Value", SocketType::Float, PropertyValue::from(0.0))])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        Ok(passthrough_property("number.constant", "value", SocketType::Float))
    }
}

/// Emits its `value` property as a single integer.
pub(super) struct Integer;

impl NodeKind for Integer {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("number.integer", "Integer", NodeCategory::Number)
            .with_outputs(vec![out("value", SocketType::Int)])
            .with_properties(vec![prop("value", "Value", SocketType::Int, PropertyValue::Integer(0))])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        Ok(passthrough_property("number.integer", "value", SocketType::Int))
    }
}

fn passthrough_property(name: &str, property: &str, socket_type: SocketType) -> FunctionDescriptor {
    FunctionDescriptor::pure(name, |args| Ok(Returned::Outputs(vec![args[0].clone()])))
        .with_property_param(property, socket_type)
        .with_return(socket_type, 0)
}

/// Emits its `values` array property as one flat float sequence.
pub(super) struct Sequence;

impl NodeKind for Sequence {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("number.sequence", "Sequence", NodeCategory::Number)
            .with_outputs(vec![out("values", SocketType::Float)])
            .with_properties(vec![prop(
                "values",
                "Values",
                SocketType::List,
                PropertyValue::Array(Vec::new()),
            )])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        Ok(FunctionDescriptor::pure("number.sequence", |args| {
            let items = match args[0].value(0)? {
                Value::List(items) => items.clone(),
                other => vec![other.clone()],
            };
            let values = items
                .iter()
                .map(|v| {
                    v.as_float()
                        .map(Value::Float)
                        .ok_or_else(|| NodeError::invalid_input(0, format!("{} is not a number", v)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Returned::many(values))
        })
        .with_property_param("values", SocketType::List)
        .with_return(SocketType::Float, 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathMode {
    Add,
    Sub,
    Mul,
    Div,
    Sqrt,
    CopySign,
    Absolute,
    Reciprocal,
    Negate,
    Add1,
    Sub1,
    Div2,
    Mul2,
    AsInt,
    Round,
    E,
}

impl MathMode {
    pub(crate) const ALL: [MathMode; 16] = [
        MathMode::Add,
        MathMode::Sub,
        MathMode::Mul,
        MathMode::Div,
        MathMode::Sqrt,
        MathMode::CopySign,
        MathMode::Absolute,
        MathMode::Reciprocal,
        MathMode::Negate,
        MathMode::Add1,
        MathMode::Sub1,
        MathMode::Div2,
        MathMode::Mul2,
        MathMode::AsInt,
        MathMode::Round,
        MathMode::E,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            MathMode::Add => "add",
            MathMode::Sub => "sub",
            MathMode::Mul => "mul",
            MathMode::Div => "div",
            MathMode::Sqrt => "sqrt",
            MathMode::CopySign => "copy_sign",
            MathMode::Absolute => "absolute",
            MathMode::Reciprocal => "reciprocal",
            MathMode::Negate => "negate",
            MathMode::Add1 => "add_1",
            MathMode::Sub1 => "sub_1",
            MathMode::Div2 => "div_2",
            MathMode::Mul2 => "mul_2",
            MathMode::AsInt => "as_int",
            MathMode::Round => "round",
            MathMode::E => "e",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    fn inputs(self) -> Vec<SocketDefinition> {
        let x = |default: f64| inp("x", SocketType::Float).with_default(default);
        let y = |default: f64| inp("y", SocketType::Float).with_default(default);
        match self {
            MathMode::Add | MathMode::Sub | MathMode::Mul | MathMode::Div => vec![x(0.0), y(0.0)],
            MathMode::CopySign => vec![x(1.0), y(0.0)],
            MathMode::Sqrt | MathMode::Absolute => vec![x(1.0)],
            MathMode::Round => vec![x(0.0), inp("y", SocketType::Int).with_default(0i64)],
            MathMode::E => Vec::new(),
            _ => vec![x(0.0)],
        }
    }

    fn output_type(self) -> SocketType {
        match self {
            MathMode::AsInt => SocketType::Int,
            _ => SocketType::Float,
        }
    }

    fn apply(self, xs: &[f64]) -> Result<Value, NodeError> {
        let arg = |i: usize| {
            xs.get(i)
                .copied()
                .ok_or_else(|| NodeError::invalid_input(i, "missing argument"))
        };
        let result = match self {
            MathMode::Add => arg(0)? + arg(1)?,
            MathMode::Sub => arg(0)? - arg(1)?,
            MathMode::Mul => arg(0)? * arg(1)?,
            MathMode::Div => {
                let y = arg(1)?;
                if y == 0.0 {
                    return Err(NodeError::DivisionByZero);
                }
                arg(0)? / y
            }
            MathMode::Sqrt => {
                let x = arg(0)?;
                if x < 0.0 {
                    return Err(NodeError::invalid_input(0, "square root of a negative number"));
                }
                x.sqrt()
            }
            MathMode::CopySign => arg(0)?.copysign(arg(1)?),
            MathMode::Absolute => arg(0)?.abs(),
            MathMode::Reciprocal => {
                let x = arg(0)?;
                if x == 0.0 {
                    return Err(NodeError::DivisionByZero);
                }
                1.0 / x
            }
            MathMode::Negate => -arg(0)?,
            MathMode::Add1 => arg(0)? + 1.0,
            MathMode::Sub1 => arg(0)? - 1.0,
            MathMode::Div2 => arg(0)? / 2.0,
            MathMode::Mul2 => arg(0)? * 2.0,
            MathMode::AsInt => return Ok(Value::Int(arg(0)?.trunc() as i64)),
            MathMode::Round => {
                let scale = 10f64.powi(arg(1)? as i32);
                (arg(0)? * scale).round() / scale
            }
            MathMode::E => std::f64::consts::E,
        };
        Ok(Value::Float(result))
    }
}

/// Scalar arithmetic; the `mode` property picks the operation and with it the
/// node's input sockets.
pub(super) struct Math;

impl Math {
    fn mode(properties: &PropertyMap) -> Option<MathMode> {
        MathMode::from_name(&properties.get_string("mode").unwrap_or_else(|| "add".to_string()))
    }
}

impl NodeKind for Math {
    fn template(&self) -> NodeTemplate {
        let (inputs, outputs) = self.sockets(&PropertyMap::new());
        NodeTemplate::new("number.math", "Math", NodeCategory::Number)
            .with_description("Scalar arithmetic selected by mode")
            .with_inputs(inputs)
            .with_outputs(outputs)
            .with_properties(vec![prop("mode", "Mode", SocketType::Text, "add".into())])
    }

    fn sockets(&self, properties: &PropertyMap) -> (Vec<SocketDefinition>, Vec<SocketDefinition>) {
        let mode = Self::mode(properties).unwrap_or(MathMode::Add);
        (mode.inputs(), vec![out("result", mode.output_type())])
    }

    fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        let name = string_property(node, "mode", "add");
        let mode = MathMode::from_name(&name)
            .ok_or_else(|| NodeError::message(format!("unknown math mode '{}'", name)))?;

        let mut descriptor =
            FunctionDescriptor::pure(format!("number.math/{}", mode.name()), move |args| {
                let xs = args
                    .iter()
                    .enumerate()
                    .map(|(i, a)| a.float(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Returned::Outputs(vec![Data::One(mode.apply(&xs)?)]))
            });
        for (index, socket) in mode.inputs().iter().enumerate() {
            descriptor = descriptor.with_socket_param(index, 0, socket.socket_type);
        }
        Ok(descriptor.with_return(mode.output_type(), 0))
    }
}
