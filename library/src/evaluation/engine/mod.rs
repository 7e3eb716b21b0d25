//! Level-matching execution engine.
//!
//! A node function declares the nesting level it natively consumes for each
//! parameter (0 = one payload per call, 1 = one flat sequence per call). Input
//! containers may be deeper than that. The engine descends into every input
//! that is deeper than declared, calling the function once per element and
//! holding shallower inputs constant, until the levels line up. Output
//! containers grow one child per descent, so the result mirrors the shape of
//! the broadcast inputs.

use crate::error::NodeError;
use crate::evaluation::data_tree::DataTree;
use crate::evaluation::function::NodeFunction;
use crate::evaluation::value::{Data, Returned, Value};

/// Invokes `function` against `inputs`, broadcasting over any input deeper
/// than its declared level, and writes results into `outputs`.
///
/// `outputs[j]` is `None` when output `j` has no consumer; results for it are
/// discarded. Output levels are never known up front; they are derived from
/// what was written.
pub fn recurse_levels(
    function: &mut dyn NodeFunction,
    in_levels: &[usize],
    out_levels: &[usize],
    inputs: &[&DataTree],
    outputs: &mut [Option<&mut DataTree>],
) -> Result<(), NodeError> {
    if inputs.len() != in_levels.len() {
        return Err(NodeError::message(format!(
            "{} inputs supplied for {} parameters",
            inputs.len(),
            in_levels.len()
        )));
    }
    if outputs.len() != out_levels.len() {
        return Err(NodeError::message(format!(
            "{} output slots supplied for {} returns",
            outputs.len(),
            out_levels.len()
        )));
    }

    let aligned = inputs
        .iter()
        .zip(in_levels)
        .all(|(tree, &level)| tree.level() <= level);

    if aligned {
        return invoke(function, in_levels, out_levels, inputs, outputs);
    }

    // Inputs deeper than declared are broadcast axes; the rest are reused
    // unsplit for every element.
    let axes: Vec<Option<&[DataTree]>> = inputs
        .iter()
        .zip(in_levels)
        .map(|(tree, &level)| (tree.level() > level).then(|| tree.children()))
        .collect();

    let any_empty = axes.iter().flatten().any(|children| children.is_empty());
    let length = if any_empty {
        0
    } else {
        axes.iter()
            .flatten()
            .map(|children| children.len())
            .max()
            .unwrap_or(0)
    };

    for k in 0..length {
        let args: Vec<&DataTree> = inputs
            .iter()
            .zip(&axes)
            .map(|(tree, axis)| match axis {
                // Short sequences repeat their last element.
                Some(children) => &children[k.min(children.len() - 1)],
                None => *tree,
            })
            .collect();

        let mut children: Vec<Option<&mut DataTree>> = outputs
            .iter_mut()
            .map(|slot| slot.as_mut().map(|tree| tree.push_child()))
            .collect();

        recurse_levels(function, in_levels, out_levels, &args, &mut children)?;
    }

    for tree in outputs.iter_mut().flatten() {
        tree.set_level();
    }
    Ok(())
}

/// Base case: every input is at (or below) its declared level.
fn invoke(
    function: &mut dyn NodeFunction,
    in_levels: &[usize],
    out_levels: &[usize],
    inputs: &[&DataTree],
    outputs: &mut [Option<&mut DataTree>],
) -> Result<(), NodeError> {
    let mut args = Vec::with_capacity(inputs.len());
    for (tree, &level) in inputs.iter().zip(in_levels) {
        if level == 0 {
            match tree.payload() {
                Some(value) => args.push(Data::One(value.clone())),
                // An unwritten element propagates as an empty result.
                None => return Ok(()),
            }
        } else {
            // Shallower data is lifted: a single payload becomes a
            // one-element sequence.
            let values: Vec<Value> = tree.leaves().into_iter().cloned().collect();
            args.push(Data::Many(values));
        }
    }

    let returned = function.call(&args)?;
    write_results(returned, out_levels, outputs)
}

fn write_results(
    returned: Returned,
    out_levels: &[usize],
    outputs: &mut [Option<&mut DataTree>],
) -> Result<(), NodeError> {
    if out_levels.is_empty() {
        return Ok(());
    }

    let columns = match returned {
        Returned::Nothing => {
            return Err(NodeError::return_shape(format!(
                "function returned nothing for {} declared outputs",
                out_levels.len()
            )));
        }
        Returned::Outputs(columns) => columns,
        Returned::Rows(rows) => transpose(rows, out_levels)?,
    };

    if columns.len() != out_levels.len() {
        return Err(NodeError::return_shape(format!(
            "expected {} outputs, got {}",
            out_levels.len(),
            columns.len()
        )));
    }

    for ((data, &level), slot) in columns.into_iter().zip(out_levels).zip(outputs.iter_mut()) {
        if let Some(tree) = slot {
            tree.assign(data, level)?;
        }
    }
    Ok(())
}

/// Regroups per-element rows into one column per output.
fn transpose(rows: Vec<Vec<Value>>, out_levels: &[usize]) -> Result<Vec<Data>, NodeError> {
    let width = out_levels.len();
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(NodeError::return_shape(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                width
            )));
        }
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    columns
        .into_iter()
        .zip(out_levels)
        .map(|(mut column, &level)| {
            if level == 0 {
                match (column.pop(), column.is_empty()) {
                    (Some(value), true) => Ok(Data::One(value)),
                    _ => Err(NodeError::return_shape(
                        "level-0 output needs exactly one row",
                    )),
                }
            } else {
                Ok(Data::Many(column))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::function::PureFn;

    /// Sums level-0 floats and counts invocations.
    struct CountingAdd {
        calls: usize,
    }

    impl NodeFunction for CountingAdd {
        fn call(&mut self, args: &[Data]) -> Result<Returned, NodeError> {
            self.calls += 1;
            let mut total = 0.0;
            for (i, arg) in args.iter().enumerate() {
                total += arg.float(i)?;
            }
            Ok(Returned::one(total))
        }
    }

    fn floats(values: &[f64]) -> DataTree {
        DataTree::sequence(values.iter().map(|v| Value::Float(*v)).collect())
    }

    fn payloads(tree: &DataTree) -> Vec<f64> {
        tree.leaves().iter().filter_map(|v| v.as_float()).collect()
    }

    #[test]
    fn test_scalar_identity_calls_once() {
        let mut add = CountingAdd { calls: 0 };
        let a = DataTree::leaf(Value::Float(1.0));
        let b = DataTree::leaf(Value::Float(2.0));
        let mut out = DataTree::new();
        recurse_levels(&mut add, &[0, 0], &[0], &[&a, &b], &mut [Some(&mut out)]).unwrap();
        out.set_level();

        assert_eq!(add.calls, 1);
        assert_eq!(out.level(), 0);
        assert_eq!(out.payload(), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_vector_against_held_scalar() {
        let mut add = CountingAdd { calls: 0 };
        let a = floats(&[1.0, 2.0, 3.0]);
        let b = DataTree::leaf(Value::Float(10.0));
        let mut out = DataTree::new();
        recurse_levels(&mut add, &[0, 0], &[0], &[&a, &b], &mut [Some(&mut out)]).unwrap();

        assert_eq!(add.calls, 3);
        assert_eq!(out.level(), 1);
        assert_eq!(payloads(&out), vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_shorter_sequence_repeats_last_element() {
        let mut add = CountingAdd { calls: 0 };
        let a = floats(&[1.0, 2.0, 3.0]);
        let b = floats(&[10.0, 20.0]);
        let mut out = DataTree::new();
        recurse_levels(&mut add, &[0, 0], &[0], &[&a, &b], &mut [Some(&mut out)]).unwrap();

        assert_eq!(payloads(&out), vec![11.0, 22.0, 23.0]);
    }

    #[test]
    fn test_empty_axis_yields_empty_result() {
        let mut add = CountingAdd { calls: 0 };
        let a = floats(&[1.0, 2.0, 3.0]);
        let b = floats(&[]);
        let mut out = DataTree::new();
        recurse_levels(&mut add, &[0, 0], &[0], &[&a, &b], &mut [Some(&mut out)]).unwrap();

        assert_eq!(add.calls, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_nested_input_descends_twice() {
        let mut add = CountingAdd { calls: 0 };
        let a = DataTree::from_children(vec![floats(&[1.0, 2.0]), floats(&[3.0])]);
        let b = DataTree::leaf(Value::Float(100.0));
        let mut out = DataTree::new();
        recurse_levels(&mut add, &[0, 0], &[0], &[&a, &b], &mut [Some(&mut out)]).unwrap();

        assert_eq!(add.calls, 3);
        assert_eq!(out.level(), 2);
        assert_eq!(payloads(&out.children()[0]), vec![101.0, 102.0]);
        assert_eq!(payloads(&out.children()[1]), vec![103.0]);
    }

    #[test]
    fn test_level_one_parameter_receives_whole_sequence() {
        let mut sum = PureFn(|args: &[Data]| -> Result<Returned, NodeError> {
            let total: f64 = args[0].values().iter().filter_map(Value::as_float).sum();
            Ok(Returned::one(total))
        });
        let a = DataTree::from_children(vec![floats(&[1.0, 2.0]), floats(&[3.0, 4.0, 5.0])]);
        let mut out = DataTree::new();
        recurse_levels(&mut sum, &[1], &[0], &[&a], &mut [Some(&mut out)]).unwrap();

        assert_eq!(out.level(), 1);
        assert_eq!(payloads(&out), vec![3.0, 12.0]);
    }

    #[test]
    fn test_scalar_is_lifted_into_sequence_parameter() {
        let mut count = PureFn(|args: &[Data]| -> Result<Returned, NodeError> {
            Ok(Returned::one(Value::Int(args[0].values().len() as i64)))
        });
        let a = DataTree::leaf(Value::Float(7.0));
        let mut out = DataTree::new();
        recurse_levels(&mut count, &[1], &[0], &[&a], &mut [Some(&mut out)]).unwrap();

        assert_eq!(out.payload(), Some(&Value::Int(1)));
    }

    #[test]
    fn test_unconnected_output_is_discarded() {
        let mut split = PureFn(|args: &[Data]| -> Result<Returned, NodeError> {
            let v = args[0].float(0)?;
            Ok(Returned::Outputs(vec![
                Data::One(Value::Float(v * 2.0)),
                Data::One(Value::Float(v * 3.0)),
            ]))
        });
        let a = floats(&[1.0, 2.0]);
        let mut second = DataTree::new();
        recurse_levels(&mut split, &[0], &[0, 0], &[&a], &mut [None, Some(&mut second)]).unwrap();

        assert_eq!(payloads(&second), vec![3.0, 6.0]);
    }

    #[test]
    fn test_rows_are_transposed_into_columns() {
        let mut enumerate = PureFn(|args: &[Data]| -> Result<Returned, NodeError> {
            let rows = args[0]
                .values()
                .iter()
                .enumerate()
                .map(|(i, v)| vec![Value::Int(i as i64), v.clone()])
                .collect();
            Ok(Returned::Rows(rows))
        });
        let a = floats(&[5.0, 6.0, 7.0]);
        let mut indices = DataTree::new();
        let mut values = DataTree::new();
        recurse_levels(
            &mut enumerate,
            &[1],
            &[1, 1],
            &[&a],
            &mut [Some(&mut indices), Some(&mut values)],
        )
        .unwrap();

        assert_eq!(indices.child_payloads(), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert_eq!(payloads(&values), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_missing_return_is_an_error() {
        let mut sink = PureFn(|_: &[Data]| -> Result<Returned, NodeError> { Ok(Returned::Nothing) });
        let a = DataTree::leaf(Value::Float(1.0));
        let mut out = DataTree::new();
        let err = recurse_levels(&mut sink, &[0], &[0], &[&a], &mut [Some(&mut out)]).unwrap_err();
        assert!(matches!(err, NodeError::ReturnShape(_)));
    }
}
