use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use crate::evaluation::data_tree::DataTree;
use crate::model::socket::SocketId;

#[derive(Debug, Default)]
struct GraphEntries {
    trees: HashMap<SocketId, DataTree>,
    /// Output sockets whose tree was written by a node evaluation this run.
    computed: Vec<SocketId>,
    redirects: HashMap<SocketId, SocketId>,
}

/// Per-run store of one container per output socket.
///
/// Entries live until the next [`ResultCache::reset`] for the same graph.
/// Redirects let a socket that was removed from the canonical graph (a
/// reroute output) answer with its true producer's container.
#[derive(Debug, Default)]
pub struct ResultCache {
    graphs: HashMap<Uuid, GraphEntries>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every container and redirect held for `graph_id`.
    pub fn reset(&mut self, graph_id: Uuid) {
        if let Some(entries) = self.graphs.remove(&graph_id) {
            debug!(
                "Result cache reset for graph {} ({} containers)",
                graph_id,
                entries.trees.len()
            );
        }
    }

    pub fn redirect(&mut self, graph_id: Uuid, from: SocketId, to: SocketId) {
        self.graphs
            .entry(graph_id)
            .or_default()
            .redirects
            .insert(from, to);
    }

    /// Follows redirects until a socket without one is reached.
    pub fn resolve(&self, graph_id: Uuid, socket: SocketId) -> SocketId {
        let Some(entries) = self.graphs.get(&graph_id) else {
            return socket;
        };
        let mut current = socket;
        // Bounded by the number of redirects so a bad chain cannot spin.
        for _ in 0..=entries.redirects.len() {
            match entries.redirects.get(&current) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }

    /// Returns the container for `socket`, creating an empty one if absent.
    pub fn get(&mut self, graph_id: Uuid, socket: SocketId) -> &mut DataTree {
        let key = self.resolve(graph_id, socket);
        self.graphs
            .entry(graph_id)
            .or_default()
            .trees
            .entry(key)
            .or_default()
    }

    /// Read-only lookup; never creates.
    pub fn lookup(&self, graph_id: Uuid, socket: SocketId) -> Option<&DataTree> {
        let key = self.resolve(graph_id, socket);
        self.graphs.get(&graph_id)?.trees.get(&key)
    }

    /// Stores the result of the one evaluation that computes `socket`.
    ///
    /// Returns `false` (and keeps the existing container) if the socket was
    /// already computed this run.
    pub fn store(&mut self, graph_id: Uuid, socket: SocketId, tree: DataTree) -> bool {
        let key = self.resolve(graph_id, socket);
        let entries = self.graphs.entry(graph_id).or_default();
        if entries.computed.contains(&key) {
            return false;
        }
        entries.computed.push(key);
        entries.trees.insert(key, tree);
        true
    }

    pub fn is_computed(&self, graph_id: Uuid, socket: SocketId) -> bool {
        let key = self.resolve(graph_id, socket);
        self.graphs
            .get(&graph_id)
            .is_some_and(|e| e.computed.contains(&key))
    }

    /// Computed output sockets in evaluation order.
    pub fn computed(&self, graph_id: Uuid) -> &[SocketId] {
        self.graphs
            .get(&graph_id)
            .map(|e| e.computed.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, graph_id: Uuid) -> usize {
        self.graphs.get(&graph_id).map_or(0, |e| e.trees.len())
    }
}
