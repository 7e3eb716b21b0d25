use super::{inp, out, prop};
use crate::error::NodeError;
use crate::evaluation::function::FunctionDescriptor;
use crate::evaluation::value::{Returned, Value};
use crate::model::node::GraphNode;
use crate::model::socket::SocketType;
use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate, string_property};

/// Longest sequence a single repeat call may produce.
const MAX_REPEAT_LEN: usize = 1 << 24;

/// Repeats a sequence `count` times.
///
/// `repeat` repeats each element in place (`[1, 2]` -> `[1, 1, 2, 2]`),
/// `tile` repeats the whole sequence (`[1, 2]` -> `[1, 2, 1, 2]`).
pub(super) struct Repeat;

impl NodeKind for Repeat {
    fn template(&self) -> NodeTemplate {
        NodeTemplate::new("list.repeat", "Repeat", NodeCategory::List)
            .with_inputs(vec![
                inp("values", SocketType::Float).with_default(0.0),
                inp("count", SocketType::Int).with_default(2i64),
            ])
            .with_outputs(vec![out("values", SocketType::Float)])
            .with_properties(vec![prop("mode", "Mode", SocketType::Text, "repeat".into())])
    }

    fn compile(&self, node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
        let mode = string_property(node, "mode", "repeat");
        let tile = match mode.as_str() {
            "repeat" => false,
            "tile" => true,
            other => {
                return Err(NodeError::message(format!("unknown repeat mode '{}'", other)));
            }
        };

        Ok(
            FunctionDescriptor::pure(format!("list.repeat/{}", mode), move |args| {
                let values = args[0].values();
                let count = usize::try_from(args[1].int(1)?)
                    .map_err(|_| NodeError::invalid_input(1, "count must not be negative"))?;
                match values.len().checked_mul(count) {
                    Some(len) if len <= MAX_REPEAT_LEN => {}
                    _ => {
                        return Err(NodeError::invalid_input(
                            1,
                            format!("result would exceed {} elements", MAX_REPEAT_LEN),
                        ));
                    }
                }
                Ok(Returned::many(repeat_values(values, count, tile)))
            })
            .with_socket_param(0, 1, SocketType::Float)
            .with_socket_param(1, 0, SocketType::Int)
            .with_return(SocketType::Float, 1),
        )
    }
}

fn repeat_values(values: &[Value], count: usize, tile: bool) -> Vec<Value> {
    if values.is_empty() {
        return Vec::new();
    }
    if tile {
        (0..count).flat_map(|_| values.iter().cloned()).collect()
    } else {
        values
            .iter()
            .flat_map(|v| std::iter::repeat_n(v.clone(), count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::value::Data;

    fn ints(xs: &[i64]) -> Vec<Value> {
        xs.iter().map(|x| Value::Int(*x)).collect()
    }

    #[test]
    fn test_repeat_and_tile_order() {
        assert_eq!(repeat_values(&ints(&[1, 2]), 2, false), ints(&[1, 1, 2, 2]));
        assert_eq!(repeat_values(&ints(&[1, 2]), 2, true), ints(&[1, 2, 1, 2]));
        assert!(repeat_values(&ints(&[1, 2]), 0, true).is_empty());
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let node = GraphNode::new("list.repeat", "r");
        let mut descriptor = Repeat.compile(&node).unwrap();
        let err = descriptor
            .function_mut()
            .call(&[Data::Many(ints(&[1])), Data::One(Value::Int(-1))])
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { index: 1, .. }));
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        let node = GraphNode::new("list.repeat", "r");
        let mut descriptor = Repeat.compile(&node).unwrap();
        let function = descriptor.function_mut();
        let err = function
            .call(&[Data::Many(ints(&[1, 2])), Data::One(Value::Int(i64::MAX))])
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { index: 1, .. }));

        let limit = (MAX_REPEAT_LEN / 2) as i64;
        assert!(function
            .call(&[Data::Many(ints(&[1, 2])), Data::One(Value::Int(limit + 1))])
            .is_err());
        // An empty sequence stays empty whatever the count.
        assert!(function
            .call(&[Data::Many(Vec::new()), Data::One(Value::Int(i64::MAX))])
            .is_ok());
    }
}
