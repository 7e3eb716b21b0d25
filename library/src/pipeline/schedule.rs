//! Execution ordering of a canonical graph.

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use super::preprocess::CanonicalGraph;
use crate::error::ExecutionError;

/// Orders canonical nodes so every producer runs before its consumers.
///
/// A node's weight is its greatest distance from a sink (a node nobody
/// consumes), walking consumer -> producer; shared producers take the
/// maximum. Nodes run by descending weight, ties broken by declaration order.
pub fn schedule(canonical: &CanonicalGraph) -> Result<Vec<Uuid>, ExecutionError> {
    let position: HashMap<Uuid, usize> = canonical
        .nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    // In-degree on the consumer -> producer graph: how many distinct
    // consumers a node still waits on.
    let mut pending_consumers: HashMap<Uuid, usize> =
        canonical.nodes.iter().map(|id| (*id, 0)).collect();
    for consumer in &canonical.nodes {
        for producer in canonical.producers(*consumer) {
            if let Some(count) = pending_consumers.get_mut(producer) {
                *count += 1;
            }
        }
    }

    // Kahn's algorithm, starting from the sinks in declaration order.
    let mut queue: VecDeque<Uuid> = canonical
        .nodes
        .iter()
        .filter(|id| pending_consumers.get(*id) == Some(&0))
        .copied()
        .collect();
    let mut weights: HashMap<Uuid, usize> = queue.iter().map(|id| (*id, 0)).collect();
    let mut visited = 0;

    while let Some(consumer) = queue.pop_front() {
        visited += 1;
        let weight = weights.get(&consumer).copied().unwrap_or(0);
        for producer in canonical.producers(consumer) {
            let entry = weights.entry(*producer).or_insert(0);
            *entry = (*entry).max(weight + 1);
            if let Some(count) = pending_consumers.get_mut(producer) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(*producer);
                }
            }
        }
    }

    if visited < canonical.nodes.len() {
        let stuck = canonical
            .nodes
            .iter()
            .find(|id| pending_consumers.get(*id).is_some_and(|c| *c > 0))
            .copied()
            .unwrap_or_default();
        return Err(ExecutionError::GraphCycle {
            node: canonical.label(stuck),
        });
    }

    let mut order = canonical.nodes.clone();
    order.sort_by_key(|id| {
        (
            Reverse(weights.get(id).copied().unwrap_or(0)),
            position.get(id).copied().unwrap_or(usize::MAX),
        )
    });
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::NodeGraph;
    use crate::model::socket::SocketId;
    use crate::pipeline::preprocess::preprocess;
    use crate::plugin::Registry;

    fn add(registry: &Registry, graph: &mut NodeGraph, type_id: &str) -> Uuid {
        graph.add_node(registry.create_node(type_id).unwrap())
    }

    fn link(graph: &mut NodeGraph, from: Uuid, to: Uuid, input: usize) {
        graph.add_link(SocketId::new(from, 0), SocketId::new(to, input));
    }

    fn position(order: &[Uuid], id: Uuid) -> usize {
        order.iter().position(|x| *x == id).unwrap()
    }

    #[test]
    fn test_producers_precede_consumers() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("diamond");
        // Declared sink-first so declaration order alone would be wrong.
        let sink = add(&registry, &mut graph, "number.math");
        let left = add(&registry, &mut graph, "number.math");
        let right = add(&registry, &mut graph, "number.math");
        let source = add(&registry, &mut graph, "number.constant");
        link(&mut graph, left, sink, 0);
        link(&mut graph, right, sink, 1);
        link(&mut graph, source, left, 0);
        link(&mut graph, source, right, 0);

        let canonical = preprocess(&graph, &registry).unwrap();
        let order = schedule(&canonical).unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], source);
        assert!(position(&order, left) < position(&order, sink));
        assert!(position(&order, right) < position(&order, sink));
        // Equal weight: declaration order.
        assert!(position(&order, left) < position(&order, right));
    }

    #[test]
    fn test_shared_producer_takes_longest_path() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("chain");
        let a = add(&registry, &mut graph, "number.constant");
        let b = add(&registry, &mut graph, "number.math");
        let c = add(&registry, &mut graph, "number.math");
        link(&mut graph, a, b, 0);
        link(&mut graph, b, c, 0);
        link(&mut graph, a, c, 1);

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(schedule(&canonical).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_cycle_is_detected() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("cycle");
        let a = add(&registry, &mut graph, "number.math");
        let b = add(&registry, &mut graph, "number.math");
        link(&mut graph, a, b, 0);
        link(&mut graph, b, a, 0);

        let canonical = preprocess(&graph, &registry).unwrap();
        assert!(matches!(
            schedule(&canonical),
            Err(ExecutionError::GraphCycle { .. })
        ));
    }

    #[test]
    fn test_independent_chains_keep_declaration_order() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("independent");
        let y = add(&registry, &mut graph, "number.math");
        let a = add(&registry, &mut graph, "number.constant");
        let b = add(&registry, &mut graph, "number.constant");
        let x = add(&registry, &mut graph, "number.math");
        link(&mut graph, a, x, 0);
        link(&mut graph, b, y, 0);
        // Never linked, so never scheduled.
        add(&registry, &mut graph, "number.constant");

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(schedule(&canonical).unwrap(), vec![a, b, y, x]);
    }
}
