use super::{inp, out, prop};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::{Data, Returned, Value};
use crate::model::node::GraphNode;
use crate::model::property::{PropertyMap, Vec3};
use crate::model::socket::{SocketDefinition, SocketType};
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate, string_property};

type V3 = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorMode {
    Add,
    Sub,
    Cross,
    Scale,
    ScaleReciprocal,
    Length,
    Dot,
    Opposite,
    Distance,
    Round,
}

impl VectorMode {
    const ALL: [VectorMode; 10] = [
        VectorMode::Add,
        VectorMode::Sub,
        VectorMode::Cross,
        VectorMode::Scale,
        VectorMode::ScaleReciprocal,
        VectorMode::Length,
        VectorMode::Dot,
        VectorMode::Opposite,
        VectorMode::Distance,
        VectorMode::Round,
    ];

    fn name(self) -> &'static str {
        match self {
            VectorMode::Add => "add",
            VectorMode::Sub => "sub",
            VectorMode::Cross => "cross",
            VectorMode::Scale => "scale",
            VectorMode::ScaleReciprocal => "scale_reciprocal",
            VectorMode::Length => "length",
            VectorMode::Dot => "dot",
            VectorMode::Opposite => "opposite",
            VectorMode::Distance => "distance",
            VectorMode::Round => "round",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    fn inputs(self) -> Vec<SocketDefinition> {
        let vector = |name: &str| inp(name, SocketType::Vector).with_default(Vec3::new(0.0, 0.0, 0.0));
        match self {
            VectorMode::Add
            | VectorMode::Sub
            | VectorMode::Cross
            | VectorMode::Dot
            | VectorMode::Distance => vec![vector("u"), vector("v")],
            VectorMode::Scale | VectorMode::ScaleReciprocal => {
                vec![vector("u"), inp("s", SocketType::Float).with_default(1.0)]
            }
            VectorMode::Length | VectorMode::Opposite => vec![vector("u")],
            VectorMode::Round => vec![vector("u"), inp("n", SocketType::Int).with_default(7i64)],
        }
    }

    fn output_type(self) -> SocketType {
        match self {
            VectorMode::Length | VectorMode::Dot | VectorMode::Distance => SocketType::Float,
            _ => SocketType::Vector,
        }
    }

    fn apply(self, args: &[Data]) -> Result<Value, NodeError> {
        let u = args[0].vector(0)?;
        let value = match self {
            VectorMode::Add => Value::Vector(zip(u, args[1].vector(1)?, |a, b| a + b)),
            VectorMode::Sub => Value::Vector(zip(u, args[1].vector(1)?, |a, b| a - b)),
            VectorMode::Cross => {
                let v = args[1].vector(1)?;
                Value::Vector([
                    u[1] * v[2] - u[2] * v[1],
                    u[2] * v[0] - u[0] * v[2],
                    u[0] * v[1] - u[1] * v[0],
                ])
            }
            VectorMode::Scale => {
                let s = args[1].float(1)?;
                Value::Vector(u.map(|x| x * s))
            }
            VectorMode::ScaleReciprocal => {
                let s = args[1].float(1)?;
                if s == 0.0 {
                    return Err(NodeError::DivisionByZero);
                }
                Value::Vector(u.map(|x| x / s))
            }
            VectorMode::Length => Value::Float(dot(u, u).sqrt()),
            VectorMode::Dot => Value::Float(dot(u, args[1].vector(1)?)),
            VectorMode::Opposite => Value::Vector(u.map(|x| -x)),
            VectorMode::Distance => {
                let d = zip(u, args[1].vector(1)?, |a, b| a - b);
                Value::Float(dot(d, d).sqrt())
            }
            VectorMode::Round => {
                let scale = 10f64.powi(args[1].int(1)? as i32);
                Value::Vector(u.map(|x| (x * scale).round() / scale))
            }
        };
        Ok(value)
    }
}

fn zip(a: V3, b: V3, f: impl Fn(f64, f64) -> f64) -> V3 {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])]
}

fn dot(a: V3, b: V3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Per-vector arithmetic selected by `mode`.
pub(super) struct VectorMath;

impl NodeKind for VectorMath {
    fn template(&self) -> NodeTemplate {
        let (inputs, outputs) = self.sockets(&PropertyMap::new());
        NodeTemplate::new("vector.math", "Vector Math", NodeCategory::Vector)
            .with_inputs(inputs)
            .with_outputs(outputs)
            .with_properties(vec![prop("mode", "Mode", SocketType::Text, "add".into())])
    }

    fn sockets(&self, properties: &PropertyMap) -> (Vec<SocketDefinition>, Vec<SocketDefinition>) {
        let mode = properties
            .get_string("mode")
            .and_then(|m| VectorMode::from_name(&m))
            .unwrap_or(VectorMode::Add);
        (mode.inputs(), vec![out("result", mode.output_type())])
    }

    fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        let name = string_property(node, "mode", "add");
        let mode = VectorMode::from_name(&name)
            .ok_or_else(|| NodeError::message(format!("unknown vector mode '{}'", name)))?;

        let mut descriptor =
            FunctionDescriptor::pure(format!("vector.math/{}", mode.name()), move |args| {
                Ok(Returned::one(mode.apply(args)?))
            });
        for (index, socket) in mode.inputs().iter().enumerate() {
            descriptor = descriptor.with_socket_param(index, 0, socket.socket_type);
        }
        Ok(descriptor.with_return(mode.output_type(), 0))
    }
}
