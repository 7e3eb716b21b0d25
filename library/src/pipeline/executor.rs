use log::{debug, error, info};
use uuid::Uuid;

use super::preprocess::{CanonicalGraph, materialize_adapters, preprocess, preprocess_with};
use super::schedule::schedule;
use crate::cache::ResultCache;
use crate::config::{AdapterMode, ExecutionConfig};
use crate::error::{ExecutionError, NodeError};
use crate::evaluation::data_tree::DataTree;
use crate::evaluation::engine::recurse_levels;
use crate::evaluation::function::{FunctionDescriptor, NodeFunction, ParamSource};
use crate::evaluation::value::Value;
use crate::model::graph::NodeGraph;
use crate::model::node::GraphNode;
use crate::model::property::PropertyValue;
use crate::model::socket::{SocketId, SocketType};
use crate::plugin::Registry;
use crate::util::timing::{ScopedTimer, TimedFunction, TimingRecorder, TimingReport};

/// Where one parameter's container comes from.
enum Argument {
    /// An upstream output already in the cache.
    Cached(SocketId),
    /// A default, property value, or empty container built for this call.
    Owned(DataTree),
}

/// Runs whole graphs: preprocess, schedule, then evaluate node by node.
///
/// Each executor owns its result cache; containers from the last run stay
/// readable through [`Executor::output`] until the next run of the same graph.
pub struct Executor<'r> {
    registry: &'r Registry,
    config: ExecutionConfig,
    cache: ResultCache,
    last_graph: Option<Uuid>,
    timing: Option<TimingReport>,
}

impl<'r> Executor<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, ExecutionConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: ExecutionConfig) -> Self {
        Self {
            registry,
            config,
            cache: ResultCache::new(),
            last_graph: None,
            timing: None,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Executes every scheduled node of `graph` once.
    ///
    /// Any failure aborts the run. Outputs written before the failure stay in
    /// the cache but are stale.
    pub fn execute_graph(&mut self, graph: &mut NodeGraph) -> Result<(), ExecutionError> {
        let result = self.run(graph);
        if let Err(e) = &result {
            error!("Graph '{}' aborted: {}", graph.name, e);
        }
        result
    }

    /// Output container computed by the last run.
    pub fn output(&self, socket: SocketId) -> Option<&DataTree> {
        self.cache.lookup(self.last_graph?, socket)
    }

    /// Every output computed by the last run, in evaluation order.
    pub fn computed_outputs(&self) -> Vec<(SocketId, &DataTree)> {
        let Some(graph_id) = self.last_graph else {
            return Vec::new();
        };
        self.cache
            .computed(graph_id)
            .iter()
            .filter_map(|s| self.cache.lookup(graph_id, *s).map(|t| (*s, t)))
            .collect()
    }

    pub fn timing_report(&self) -> Option<&TimingReport> {
        self.timing.as_ref()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn run(&mut self, graph: &mut NodeGraph) -> Result<(), ExecutionError> {
        self.cache.reset(graph.id);
        self.last_graph = Some(graph.id);
        self.timing = None;

        let mut canonical = self.canonicalize(graph)?;
        for (from, to) in &canonical.redirects {
            self.cache.redirect(graph.id, *from, *to);
        }
        let order = schedule(&canonical)?;
        check_required_inputs(graph, &canonical, &order)?;

        let _timer = ScopedTimer::info(format!("Graph '{}' ({} nodes)", graph.name, order.len()));
        let mut recorder = self.config.instrument_timing.then(TimingRecorder::start);
        for id in order {
            self.evaluate_node(graph, &mut canonical, id, recorder.as_mut())?;
        }

        if let Some(recorder) = recorder {
            let report = recorder.finish();
            if self.config.log_timing_report {
                info!("Timing report for '{}':\n{}", graph.name, report);
            }
            self.timing = Some(report);
        }
        Ok(())
    }

    fn canonicalize(&self, graph: &mut NodeGraph) -> Result<CanonicalGraph, ExecutionError> {
        let mut canonical = preprocess(graph, self.registry)?;
        if let Some((link, reason)) = canonical.invalid_link() {
            return Err(ExecutionError::GraphInvalid {
                link,
                reason: reason.to_string(),
            });
        }
        if self.config.adapter_mode == AdapterMode::Materialize && !canonical.splices.is_empty() {
            materialize_adapters(graph, &canonical.splices);
            // Adapter nodes keep their ids, so every descriptor carries over.
            let compiled = std::mem::take(&mut canonical.descriptors);
            canonical = preprocess_with(graph, self.registry, compiled)?;
        }
        Ok(canonical)
    }

    fn evaluate_node(
        &mut self,
        graph: &NodeGraph,
        canonical: &mut CanonicalGraph,
        id: Uuid,
        recorder: Option<&mut TimingRecorder>,
    ) -> Result<(), ExecutionError> {
        let graph_id = graph.id;
        let mut descriptor = canonical
            .descriptors
            .remove(&id)
            .ok_or(ExecutionError::NodeNotFound(id))?;
        let node = canonical
            .node(graph, id)
            .ok_or(ExecutionError::NodeNotFound(id))?;
        let label = node.label();
        let _timer = ScopedTimer::debug_lazy(|| format!("Evaluating {}", label));

        let arguments = self.resolve_arguments(graph_id, node, canonical, &descriptor)?;

        // Only outputs somebody reads get a container, except on terminal
        // nodes whose results are kept for inspection.
        let terminal = !(0..node.outputs.len()).any(|j| canonical.is_consumed(node.output(j)));
        let mut outputs: Vec<Option<DataTree>> = (0..descriptor.returns.len())
            .map(|j| (terminal || canonical.is_consumed(node.output(j))).then(DataTree::new))
            .collect();

        let inputs: Vec<&DataTree> = arguments
            .iter()
            .filter_map(|argument| match argument {
                Argument::Cached(source) => self.cache.lookup(graph_id, *source),
                Argument::Owned(tree) => Some(tree),
            })
            .collect();
        let in_levels = descriptor.in_levels();
        let out_levels = descriptor.out_levels();
        let is_stateful = descriptor.is_stateful;
        let function_name = descriptor.name.clone();
        let mut slots: Vec<Option<&mut DataTree>> = outputs.iter_mut().map(Option::as_mut).collect();

        let function = descriptor.function_mut();
        let result = match recorder {
            Some(recorder) => {
                let mut timed = TimedFunction::new(function);
                let result = invoke(&mut timed, is_stateful, &in_levels, &out_levels, &inputs, &mut slots);
                recorder.record_node(&id.to_string(), &label, timed.calls(), timed.elapsed());
                recorder.record_function(&function_name, timed.calls(), timed.elapsed());
                result
            }
            None => invoke(function, is_stateful, &in_levels, &out_levels, &inputs, &mut slots),
        };
        result.map_err(|e| ExecutionError::node_evaluation(label.clone(), e))?;

        for (index, tree) in outputs.into_iter().enumerate() {
            if let Some(mut tree) = tree {
                tree.set_level();
                self.cache.store(graph_id, node.output(index), tree);
            }
        }
        debug!("Evaluated {}", label);
        Ok(())
    }

    fn resolve_arguments(
        &self,
        graph_id: Uuid,
        node: &GraphNode,
        canonical: &CanonicalGraph,
        descriptor: &FunctionDescriptor,
    ) -> Result<Vec<Argument>, ExecutionError> {
        let mut arguments = Vec::with_capacity(descriptor.parameters.len());
        for parameter in &descriptor.parameters {
            let argument = match &parameter.source {
                ParamSource::Socket(index) => match canonical.source(node.input(*index)) {
                    Some(source) if self.cache.lookup(graph_id, source).is_some() => {
                        Argument::Cached(source)
                    }
                    Some(source) => {
                        return Err(ExecutionError::node_evaluation(
                            node.label(),
                            NodeError::invalid_input(
                                *index,
                                format!(
                                    "producer {} output {} has no result",
                                    canonical.label(source.node_id),
                                    source.index
                                ),
                            ),
                        ));
                    }
                    None => {
                        let socket = node.inputs.get(*index).ok_or_else(|| {
                            ExecutionError::node_evaluation(
                                node.label(),
                                NodeError::invalid_input(*index, "node has no such input socket"),
                            )
                        })?;
                        if socket.required {
                            return Err(ExecutionError::RequiredInputUnconnected {
                                node: node.label(),
                                socket: socket.name.clone(),
                            });
                        }
                        let socket_type = match parameter.socket_type {
                            SocketType::Any => socket.socket_type,
                            declared => declared,
                        };
                        Argument::Owned(default_tree(socket.default.as_ref(), socket_type))
                    }
                },
                ParamSource::Property(name) => {
                    let value = match node.property(name) {
                        Some(value) => Some(value.clone()),
                        None => self
                            .registry
                            .template(&node.type_id)?
                            .default_property(name)
                            .cloned(),
                    };
                    Argument::Owned(default_tree(value.as_ref(), parameter.socket_type))
                }
            };
            arguments.push(argument);
        }
        Ok(arguments)
    }
}

fn default_tree(value: Option<&PropertyValue>, socket_type: SocketType) -> DataTree {
    value
        .map(|v| DataTree::leaf(Value::from_property(v, socket_type)))
        .unwrap_or_default()
}

/// Brackets a (possibly broadcast) evaluation with the stateful lifecycle.
fn invoke(
    function: &mut dyn NodeFunction,
    is_stateful: bool,
    in_levels: &[usize],
    out_levels: &[usize],
    inputs: &[&DataTree],
    outputs: &mut [Option<&mut DataTree>],
) -> Result<(), NodeError> {
    if is_stateful {
        function.start()?;
    }
    recurse_levels(function, in_levels, out_levels, inputs, outputs)?;
    if is_stateful {
        function.stop()?;
    }
    Ok(())
}

/// Fails before anything runs if a scheduled node lacks a required link.
fn check_required_inputs(
    graph: &NodeGraph,
    canonical: &CanonicalGraph,
    order: &[Uuid],
) -> Result<(), ExecutionError> {
    for id in order {
        let Some(node) = canonical.node(graph, *id) else {
            continue;
        };
        for (index, socket) in node.inputs.iter().enumerate() {
            if socket.required && canonical.source(node.input(index)).is_none() {
                return Err(ExecutionError::RequiredInputUnconnected {
                    node: node.label(),
                    socket: socket.name.clone(),
                });
            }
        }
    }
    Ok(())
}
