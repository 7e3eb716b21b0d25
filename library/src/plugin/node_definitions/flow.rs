use super::{inp, out};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::Returned;
use crate::model::node::GraphNode;
use crate::model::socket::SocketType;
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate};

pub(crate) const REROUTE: &str = "flow.reroute";

/// Layout-only passthrough. Removed from the graph before scheduling.
pub(super) struct Reroute;

impl NodeKind for Reroute {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new(REROUTE, "Reroute", NodeCategory::Flow)
            .with_inputs(vec![inp("input", SocketType::Any)])
            .with_outputs(vec![out("output", SocketType::Any)])
    }

    fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        Ok(
            FunctionDescriptor::pure(REROUTE, |args| Ok(Returned::Outputs(args.to_vec())))
                .with_socket_param(0, 0, SocketType::Any)
                .with_return(SocketType::Any, 0),
        )
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}
