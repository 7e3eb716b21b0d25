//! Canonicalization of a user graph into a pure dependency graph.
//!
//! Reroute nodes are dissolved into direct virtual links, every linked
//! node is compiled once, and links whose endpoint types differ get an
//! adapter node spliced in. The user's graph is never touched here; adapter
//! nodes only live in the returned [`CanonicalGraph`] unless the caller
//! materializes them with [`materialize_adapters`].

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::evaluation::function::FunctionDescriptor;
use crate::model::graph::NodeGraph;
use crate::model::node::GraphNode;
use crate::model::socket::{Link, SocketId, SocketType};
use crate::plugin::Registry;
use crate::plugin::conversion::Conversion;

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLink {
    pub from: SocketId,
    pub to: SocketId,
    /// Synthesized for this run only (reroute bypass or adapter wiring).
    pub is_virtual: bool,
    /// Replaced by an adapter splice; not part of the dependency graph.
    pub superseded: bool,
}

/// An adapter node inserted on one type-mismatched link.
#[derive(Debug, Clone)]
pub struct AdapterSplice {
    pub adapter: GraphNode,
    pub conversion: Conversion,
    /// Source end of the user's link (may be a reroute output).
    pub original_from: SocketId,
    /// True producer after reroutes are resolved.
    pub source: SocketId,
    pub destination: SocketId,
    /// Extra adapter output -> destination input links.
    pub routes: Vec<(SocketId, SocketId)>,
}

#[derive(Debug, Default)]
pub struct CanonicalGraph {
    /// Canonical nodes in declaration order; virtual adapters come last.
    pub nodes: Vec<Uuid>,
    pub descriptors: HashMap<Uuid, FunctionDescriptor>,
    pub virtual_nodes: HashMap<Uuid, GraphNode>,
    /// Consumer -> producers, without duplicates.
    pub dependencies: HashMap<Uuid, Vec<Uuid>>,
    /// Input socket -> the output socket that feeds it.
    pub sources: HashMap<SocketId, SocketId>,
    /// Reroute output -> true producer output.
    pub redirects: HashMap<SocketId, SocketId>,
    pub consumed_outputs: HashSet<SocketId>,
    pub links: Vec<CanonicalLink>,
    pub splices: Vec<AdapterSplice>,
    labels: HashMap<Uuid, String>,
    invalid: Option<(usize, String)>,
}

impl CanonicalGraph {
    fn invalid(link: usize, reason: String) -> Self {
        Self {
            invalid: Some((link, reason)),
            ..Default::default()
        }
    }

    /// The first invalid link found, if any. An invalid graph has no nodes.
    pub fn invalid_link(&self) -> Option<(usize, &str)> {
        self.invalid.as_ref().map(|(i, r)| (*i, r.as_str()))
    }

    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    /// A canonical node, real or virtual.
    pub fn node<'g>(&'g self, graph: &'g NodeGraph, id: Uuid) -> Option<&'g GraphNode> {
        self.virtual_nodes.get(&id).or_else(|| graph.get_node(id))
    }

    pub fn label(&self, id: Uuid) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn producers(&self, id: Uuid) -> &[Uuid] {
        self.dependencies
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn source(&self, input: SocketId) -> Option<SocketId> {
        self.sources.get(&input).copied()
    }

    pub fn is_consumed(&self, output: SocketId) -> bool {
        self.consumed_outputs.contains(&output)
    }

    /// Links that make up the dependency graph.
    pub fn active_links(&self) -> impl Iterator<Item = &CanonicalLink> {
        self.links.iter().filter(|l| !l.superseded)
    }

    fn add_node(&mut self, node: &GraphNode, descriptor: FunctionDescriptor) {
        self.nodes.push(node.id);
        self.labels.insert(node.id, node.label());
        self.descriptors.insert(node.id, descriptor);
        self.dependencies.entry(node.id).or_default();
    }

    fn connect(&mut self, from: SocketId, to: SocketId, is_virtual: bool) {
        self.links.push(CanonicalLink {
            from,
            to,
            is_virtual,
            superseded: false,
        });
        self.sources.insert(to, from);
        self.consumed_outputs.insert(from);
        let producers = self.dependencies.entry(to.node_id).or_default();
        if !producers.contains(&from.node_id) {
            producers.push(from.node_id);
        }
    }

    fn output_type(&self, graph: &NodeGraph, output: SocketId) -> SocketType {
        self.descriptors
            .get(&output.node_id)
            .and_then(|d| d.returns.get(output.index))
            .map(|r| r.socket_type)
            .or_else(|| graph.output_socket(output).map(|s| s.socket_type))
            .unwrap_or(SocketType::Any)
    }

    fn input_type(&self, graph: &NodeGraph, input: SocketId) -> SocketType {
        self.descriptors
            .get(&input.node_id)
            .and_then(|d| d.socket_parameter(input.index))
            .map(|p| p.socket_type)
            .or_else(|| graph.input_socket(input).map(|s| s.socket_type))
            .unwrap_or(SocketType::Any)
    }
}

/// Builds the canonical dependency graph for one run.
///
/// Only nodes at either end of a surviving link take part; unlinked nodes
/// are neither compiled nor scheduled. An invalid link yields an empty graph
/// flagged invalid; nothing is compiled in that case.
pub fn preprocess(graph: &NodeGraph, registry: &Registry) -> Result<CanonicalGraph, ExecutionError> {
    preprocess_with(graph, registry, HashMap::new())
}

/// Same as [`preprocess`], but nodes found in `compiled` reuse that
/// descriptor instead of being compiled again.
pub fn preprocess_with(
    graph: &NodeGraph,
    registry: &Registry,
    mut compiled: HashMap<Uuid, FunctionDescriptor>,
) -> Result<CanonicalGraph, ExecutionError> {
    for (index, link) in graph.links.iter().enumerate() {
        if let Err(reason) = graph.link_is_valid(link) {
            warn!("Graph '{}': link #{} is invalid: {}", graph.name, index, reason);
            return Ok(CanonicalGraph::invalid(index, reason));
        }
    }

    let mut canonical = CanonicalGraph::default();
    let is_passthrough =
        |id: Uuid| graph.get_node(id).is_some_and(|n| registry.is_passthrough(&n.type_id));

    for node in graph.nodes.iter().filter(|n| registry.is_passthrough(&n.type_id)) {
        let outputs = node.outputs.len().max(1);
        for index in 0..outputs {
            let output = node.output(index);
            match resolve_source(graph, registry, output) {
                Some(source) => {
                    canonical.redirects.insert(output, source);
                }
                None if graph.is_output_linked(output) => {
                    warn!(
                        "{} has no upstream producer; its links are dropped",
                        node.label()
                    );
                }
                None => {}
            }
        }
    }

    // (link, true source, bypasses a reroute)
    let mut surviving: Vec<(&Link, SocketId, bool)> = Vec::new();
    for link in &graph.links {
        // Links into a reroute are absorbed by the bypass links.
        if is_passthrough(link.to.node_id) {
            continue;
        }
        let is_virtual = is_passthrough(link.from.node_id);
        let source = if is_virtual {
            match canonical.redirects.get(&link.from) {
                Some(source) => *source,
                None => continue,
            }
        } else {
            link.from
        };
        surviving.push((link, source, is_virtual));
    }

    let linked: HashSet<Uuid> = surviving
        .iter()
        .flat_map(|(link, source, _)| [source.node_id, link.to.node_id])
        .collect();
    for node in graph.nodes.iter().filter(|n| linked.contains(&n.id)) {
        let descriptor = match compiled.remove(&node.id) {
            Some(descriptor) => descriptor,
            None => registry.compile(node)?,
        };
        canonical.add_node(node, descriptor);
    }

    for (link, source, is_virtual) in surviving {
        reconcile(graph, registry, &mut canonical, link, source, is_virtual)?;
    }

    debug!(
        "Graph '{}' canonicalized: {} nodes, {} links, {} adapters",
        graph.name,
        canonical.nodes.len(),
        canonical.active_links().count(),
        canonical.splices.len()
    );
    Ok(canonical)
}

/// Follows reroute chains upstream to the first real output socket.
fn resolve_source(graph: &NodeGraph, registry: &Registry, from: SocketId) -> Option<SocketId> {
    let mut current = from;
    let mut seen = HashSet::new();
    loop {
        let node = graph.get_node(current.node_id)?;
        if !registry.is_passthrough(&node.type_id) {
            return Some(current);
        }
        if !seen.insert(current.node_id) {
            return None;
        }
        current = graph.upstream(node.input(0))?;
    }
}

/// Keeps a type-compatible link, or splices an adapter into a mismatched one.
fn reconcile(
    graph: &NodeGraph,
    registry: &Registry,
    canonical: &mut CanonicalGraph,
    link: &Link,
    source: SocketId,
    is_virtual: bool,
) -> Result<(), ExecutionError> {
    let from_type = canonical.output_type(graph, source);
    let to_type = canonical.input_type(graph, link.to);
    let conversions = registry.conversions();
    if !conversions.needs_conversion(from_type, to_type) {
        canonical.connect(source, link.to, is_virtual);
        return Ok(());
    }

    let conversion = conversions
        .get_conversion(from_type, to_type)
        .cloned()
        .ok_or_else(|| ExecutionError::MissingConversion {
            from: from_type,
            to: to_type,
            node: canonical.label(link.to.node_id),
            socket: graph
                .input_socket(link.to)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| link.to.index.to_string()),
        })?;

    let mut adapter = registry.create_node(&conversion.adapter_type)?;
    adapter.location = midpoint(graph, link.from.node_id, link.to.node_id);
    let destination = link.to.node_id;
    for (adapter_input, destination_input) in &conversion.defaults {
        let default = graph
            .input_socket(SocketId::new(destination, *destination_input))
            .and_then(|s| s.default.clone());
        if let (Some(default), Some(socket)) = (default, adapter.inputs.get_mut(*adapter_input)) {
            socket.default = Some(default);
        }
    }
    let descriptor = registry.compile(&adapter)?;
    let adapter_in = adapter.input(conversion.input);
    let adapter_out = adapter.output(conversion.output);

    debug!(
        "Splicing {} between {} and {}",
        conversion.adapter_type,
        canonical.label(source.node_id),
        canonical.label(destination)
    );

    canonical.links.push(CanonicalLink {
        from: source,
        to: link.to,
        is_virtual,
        superseded: true,
    });
    canonical.add_node(&adapter, descriptor);
    canonical.connect(source, adapter_in, true);
    canonical.connect(adapter_out, link.to, true);

    let mut routes = Vec::new();
    for (adapter_output, destination_input) in &conversion.routes {
        let target = SocketId::new(destination, *destination_input);
        if graph.input_socket(target).is_none() || graph.is_input_linked(target) {
            warn!(
                "{}: route into input {} of {} skipped (missing or already linked)",
                conversion.adapter_type,
                destination_input,
                canonical.label(destination)
            );
            continue;
        }
        let from = adapter.output(*adapter_output);
        canonical.connect(from, target, true);
        routes.push((from, target));
    }

    canonical.virtual_nodes.insert(adapter.id, adapter.clone());
    canonical.splices.push(AdapterSplice {
        adapter,
        conversion,
        original_from: link.from,
        source,
        destination: link.to,
        routes,
    });
    Ok(())
}

fn midpoint(graph: &NodeGraph, a: Uuid, b: Uuid) -> (f64, f64) {
    let location = |id| graph.get_node(id).map_or((0.0, 0.0), |n| n.location);
    let (ax, ay) = location(a);
    let (bx, by) = location(b);
    ((ax + bx) / 2.0, (ay + by) / 2.0)
}

/// Turns spliced adapters into real nodes and links of `graph`.
///
/// Each superseded link is removed and replaced by a link into the adapter
/// and one out of it, plus one per extra route. Running the graph afterwards
/// needs no splicing.
pub fn materialize_adapters(graph: &mut NodeGraph, splices: &[AdapterSplice]) {
    for splice in splices {
        graph.remove_link(splice.original_from, splice.destination);
        let adapter_id = graph.add_node(splice.adapter.clone());
        graph.add_link(
            splice.original_from,
            SocketId::new(adapter_id, splice.conversion.input),
        );
        graph.add_link(
            SocketId::new(adapter_id, splice.conversion.output),
            splice.destination,
        );
        for (from, to) in &splice.routes {
            graph.add_link(*from, *to);
        }
        debug!(
            "Materialized {} into graph '{}'",
            splice.adapter.label(),
            graph.name
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::NodeError;
    use crate::evaluation::value::Returned;
    use crate::model::property::PropertyValue;
    use crate::model::socket::SocketDefinition;
    use crate::plugin::node_types::{NodeCategory, NodeKind, NodeTemplate};

    fn node(registry: &Registry, graph: &mut NodeGraph, type_id: &str) -> Uuid {
        let node = registry.create_node(type_id).unwrap();
        graph.add_node(node)
    }

    /// Vector -> (x, y) adapter; `offset` mirrors the destination's `y` default.
    struct Split;

    impl NodeKind for Split {
        fn template(&self) -> NodeTemplate {
            NodeTemplate::new("test.split", "Split", NodeCategory::Convert)
                .with_inputs(vec![
                    SocketDefinition::new("vector", SocketType::Vector),
                    SocketDefinition::new("offset", SocketType::Float).with_default(0.0),
                ])
                .with_outputs(vec![
                    SocketDefinition::new("x", SocketType::Float),
                    SocketDefinition::new("y", SocketType::Float),
                ])
        }

        fn compile(&self, _node: &GraphNode) -> Result<FunctionDescriptor, NodeError> {
            Ok(FunctionDescriptor::pure("test.split", |_args| Ok(Returned::Nothing))
                .with_socket_param(0, 0, SocketType::Vector)
                .with_socket_param(1, 0, SocketType::Float)
                .with_return(SocketType::Float, 0)
                .with_return(SocketType::Float, 0))
        }
    }

    fn split_registry() -> Registry {
        let mut registry = Registry::with_builtin();
        registry.register(Arc::new(Split));
        registry.register_conversion(
            SocketType::Vector,
            SocketType::Float,
            Conversion::new("test.split").with_route(1, 1).with_default_from(1, 1),
        );
        registry
    }

    #[test]
    fn test_unlinked_nodes_are_not_compiled() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("unlinked");
        let a = node(&registry, &mut graph, "number.constant");
        let lone = node(&registry, &mut graph, "matrix.transform");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(b, 0));

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(canonical.nodes, vec![a, b]);
        assert!(!canonical.descriptors.contains_key(&lone));
        assert!(canonical.producers(lone).is_empty());
    }

    #[test]
    fn test_adapter_routes_to_several_destination_inputs() {
        let registry = split_registry();
        let mut graph = NodeGraph::new("split");
        let v = node(&registry, &mut graph, "vector.math");
        let mut sum = registry.create_node("number.math").unwrap();
        sum.inputs[1].default = Some(PropertyValue::from(10.0));
        let sum = graph.add_node(sum);
        graph.add_link(SocketId::new(v, 0), SocketId::new(sum, 0));

        let canonical = preprocess(&graph, &registry).unwrap();
        let splice = &canonical.splices[0];
        let adapter = splice.adapter.id;
        assert_eq!(canonical.source(SocketId::new(sum, 0)), Some(SocketId::new(adapter, 0)));
        assert_eq!(canonical.source(SocketId::new(sum, 1)), Some(SocketId::new(adapter, 1)));
        assert_eq!(
            splice.routes,
            vec![(SocketId::new(adapter, 1), SocketId::new(sum, 1))]
        );
        assert_eq!(splice.adapter.inputs[1].default, Some(PropertyValue::from(10.0)));
        assert_eq!(canonical.producers(sum), &[adapter]);
        assert_eq!(canonical.producers(adapter), &[v]);

        materialize_adapters(&mut graph, &canonical.splices);
        assert_eq!(graph.links.len(), 3);
        let again = preprocess(&graph, &registry).unwrap();
        assert!(again.splices.is_empty());
        assert_eq!(again.source(SocketId::new(sum, 1)), Some(SocketId::new(adapter, 1)));
    }

    #[test]
    fn test_route_into_linked_input_is_skipped() {
        let registry = split_registry();
        let mut graph = NodeGraph::new("split-linked");
        let v = node(&registry, &mut graph, "vector.math");
        let c = node(&registry, &mut graph, "number.constant");
        let sum = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(v, 0), SocketId::new(sum, 0));
        graph.add_link(SocketId::new(c, 0), SocketId::new(sum, 1));

        let canonical = preprocess(&graph, &registry).unwrap();
        assert!(canonical.splices[0].routes.is_empty());
        assert_eq!(canonical.source(SocketId::new(sum, 1)), Some(SocketId::new(c, 0)));
    }

    #[test]
    fn test_invalid_link_yields_empty_graph() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("invalid");
        let a = node(&registry, &mut graph, "number.constant");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(b, 0));
        graph.links[0].is_valid = false;

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(canonical.invalid_link().map(|(i, _)| i), Some(0));
        assert!(canonical.nodes.is_empty());
        assert!(canonical.descriptors.is_empty());
    }

    #[test]
    fn test_reroute_chain_is_bypassed() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("reroute");
        let a = node(&registry, &mut graph, "number.constant");
        let r1 = node(&registry, &mut graph, "flow.reroute");
        let r2 = node(&registry, &mut graph, "flow.reroute");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(r1, 0));
        graph.add_link(SocketId::new(r1, 0), SocketId::new(r2, 0));
        graph.add_link(SocketId::new(r2, 0), SocketId::new(b, 1));

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(canonical.nodes, vec![a, b]);
        assert_eq!(canonical.source(SocketId::new(b, 1)), Some(SocketId::new(a, 0)));
        assert_eq!(canonical.producers(b), &[a]);
        assert_eq!(
            canonical.redirects.get(&SocketId::new(r2, 0)),
            Some(&SocketId::new(a, 0))
        );
        assert!(canonical.active_links().all(|l| l.is_virtual));
    }

    #[test]
    fn test_reroute_without_producer_drops_links() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("dangling");
        let r = node(&registry, &mut graph, "flow.reroute");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(r, 0), SocketId::new(b, 0));

        let canonical = preprocess(&graph, &registry).unwrap();
        assert!(canonical.source(SocketId::new(b, 0)).is_none());
        assert!(canonical.links.is_empty());
        assert!(canonical.nodes.is_empty());
    }

    #[test]
    fn test_mismatched_link_gets_adapter() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("adapter");
        let a = node(&registry, &mut graph, "number.integer");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(b, 0));

        let canonical = preprocess(&graph, &registry).unwrap();
        assert_eq!(canonical.splices.len(), 1);
        let adapter = canonical.splices[0].adapter.id;
        assert_eq!(canonical.nodes, vec![a, b, adapter]);
        assert_eq!(canonical.producers(b), &[adapter]);
        assert_eq!(canonical.producers(adapter), &[a]);
        assert_eq!(canonical.links.iter().filter(|l| l.superseded).count(), 1);
        assert_eq!(canonical.active_links().count(), 2);
        // The user graph is untouched.
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_missing_conversion_is_an_error() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("mismatch");
        let a = node(&registry, &mut graph, "vector.math");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(b, 0));

        let err = preprocess(&graph, &registry).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::MissingConversion {
                from: SocketType::Vector,
                to: SocketType::Float,
                ..
            }
        ));
    }

    #[test]
    fn test_materialized_adapters_need_no_splice() {
        let registry = Registry::with_builtin();
        let mut graph = NodeGraph::new("materialize");
        let a = node(&registry, &mut graph, "number.integer");
        let b = node(&registry, &mut graph, "number.math");
        graph.add_link(SocketId::new(a, 0), SocketId::new(b, 0));

        let canonical = preprocess(&graph, &registry).unwrap();
        materialize_adapters(&mut graph, &canonical.splices);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.links.len(), 2);

        let again = preprocess(&graph, &registry).unwrap();
        assert!(again.splices.is_empty());
        assert_eq!(again.producers(b).len(), 1);
        assert_eq!(again.producers(again.producers(b)[0]), &[a]);
    }
}
