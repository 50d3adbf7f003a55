/// Base filter
///
/// One processing stage with a single entry point (`destination`) and a
/// single exit point (`source`). Both are set together and cleared together.
use crate::audio_system::{AudioGraph, NodeId};

/// Handle to the nodes of one processing stage
///
/// Cloning a filter clones the handle, not the nodes: two clones route the
/// same graph nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    ends: Option<(NodeId, NodeId)>,
    nodes: Vec<NodeId>,
}

impl Filter {
    /// Build a filter from its entry and exit node. `source` defaults to
    /// `destination` for single-node filters.
    pub fn new(destination: NodeId, source: Option<NodeId>) -> Self {
        let source = source.unwrap_or(destination);
        let mut nodes = vec![destination];
        if source != destination {
            nodes.push(source);
        }
        Self {
            ends: Some((destination, source)),
            nodes,
        }
    }

    /// Build a filter that owns a chain of already-wired nodes
    pub(crate) fn from_chain(chain: Vec<NodeId>) -> Self {
        assert!(!chain.is_empty(), "A filter needs at least one node");
        let destination = chain[0];
        let source = chain[chain.len() - 1];
        Self {
            ends: Some((destination, source)),
            nodes: chain,
        }
    }

    /// Node that receives input from the previous stage
    pub fn destination(&self) -> Option<NodeId> {
        self.ends.map(|(destination, _)| destination)
    }

    /// Node the next stage connects from
    pub fn source(&self) -> Option<NodeId> {
        self.ends.map(|(_, source)| source)
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// True once this handle was destroyed. Clones keep their ends; use
    /// [`Filter::is_live`] to check the nodes themselves.
    pub fn is_destroyed(&self) -> bool {
        self.ends.is_none()
    }

    /// Both ends exist and every node is still in `graph`, even if the
    /// filter was destroyed through another clone
    pub fn is_live(&self, graph: &AudioGraph) -> bool {
        !self.is_destroyed() && self.nodes.iter().all(|node| graph.contains(*node))
    }

    /// Route this stage's output into `target`
    pub fn connect(&self, graph: &mut AudioGraph, target: NodeId) -> bool {
        match self.source() {
            Some(source) => graph.connect(source, target),
            None => false,
        }
    }

    /// Drop every outbound edge of this stage's output
    pub fn disconnect(&self, graph: &mut AudioGraph) {
        if let Some(source) = self.source() {
            graph.disconnect(source);
        }
    }

    /// Disconnect and release the nodes. The handle is unusable afterwards.
    pub fn destroy(&mut self, graph: &mut AudioGraph) {
        self.disconnect(graph);
        for node in self.nodes.drain(..) {
            graph.remove(node);
        }
        self.ends = None;
    }
}
