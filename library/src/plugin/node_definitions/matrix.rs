use super::{inp, out};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::{IDENTITY, Returned, Value, flatten_matrix};
use crate::model::node::GraphNode;
use crate::model::socket::SocketType;
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate};

/// Applies a 4x4 matrix to a list of vertices.
pub(super) struct Transform;

impl NodeKind for Transform {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("matrix.transform", "Matrix Transform", NodeCategory::Matrix)
            .with_inputs(vec![
                inp("vertices", SocketType::Vector).required(),
                inp("matrix", SocketType::Matrix).with_default(flatten_matrix(&IDENTITY)),
            ])
            .with_outputs(vec![out("vertices", SocketType::Vector)])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        Ok(FunctionDescriptor::pure("matrix.transform", |args| {
            let matrix = args[1].matrix(1)?;
            let vertices = args[0]
                .values()
                .iter()
                .map(|v| {
                    v.as_vector()
                        .map(|p| Value::Vector(transform_point(&matrix, p)))
                        .ok_or_else(|| NodeError::invalid_input(0, format!("{} is not a vertex", v)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Returned::many(vertices))
        })
        .with_socket_param(0, 1, SocketType::Vector)
        .with_socket_param(1, 0, SocketType::Matrix)
        .with_return(SocketType::Vector, 1))
    }
}

/// Row-major matrix times the homogeneous point `(x, y, z, 1)`.
fn transform_point(m: &[[f64; 4]; 4], p: [f64; 3]) -> [f64; 3] {
    let row = |r: usize| m[r][0] * p[0] + m[r][1] * p[1] + m[r][2] * p[2] + m[r][3];
    let w = row(3);
    let (x, y, z) = (row(0), row(1), row(2));
    if w != 0.0 && w != 1.0 {
        [x / w, y / w, z / w]
    } else {
        [x, y, z]
    }
}
