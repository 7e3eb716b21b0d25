//! Command-line runner: `cli <graph.json> [config.toml]`.

use std::fs;
use std::sync::Arc;

use log::info;

use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use crate::model::graph::NodeGraph;
use crate::pipeline::Executor;
use crate::plugin::Registry;
use crate::plugin::node_definitions::MemoryMaterializer;

pub fn run(args: Vec<String>) -> Result<(), ExecutionError> {
    let Some(graph_path) = args.get(1) else {
        return Err(ExecutionError::invalid_argument(
            "usage: cli <graph.json> [config.toml]",
        ));
    };
    let config = match args.get(2) {
        Some(path) => ExecutionConfig::load(path)?,
        None => ExecutionConfig::default(),
    };

    let mut graph = NodeGraph::load(&fs::read_to_string(graph_path)?)?;
    info!(
        "Loaded graph '{}' from {} ({} nodes, {} links)",
        graph.name,
        graph_path,
        graph.nodes.len(),
        graph.links.len()
    );

    let materializer = MemoryMaterializer::new();
    let registry = Registry::builtin_with(Arc::new(materializer.clone()));
    let mut executor = Executor::with_config(&registry, config);
    executor.execute_graph(&mut graph)?;

    for (socket, tree) in executor.computed_outputs() {
        let label = graph
            .get_node(socket.node_id)
            .map_or_else(|| socket.node_id.to_string(), |n| n.label());
        println!("{}[{}] = {}", label, socket.index, tree);
    }
    for name in materializer.names() {
        let records = materializer.records(&name).unwrap_or_default();
        println!("collected '{}': {} records", name, records.len());
        for record in records {
            let values: Vec<String> = record.iter().map(ToString::to_string).collect();
            println!("  [{}]", values.join(", "));
        }
    }
    if let Some(report) = executor.timing_report() {
        print!("{}", report);
    }
    Ok(())
}
