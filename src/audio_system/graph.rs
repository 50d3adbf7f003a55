//! Audio node graph
//!
//! A software model of a WebAudio-style routing graph: nodes live in an arena
//! addressed by opaque [`NodeId`] handles, edges are plain `(from, to)` pairs.
//! Buffer-source nodes carry their own playback cursor so the graph can report
//! natural completion the way a platform `onended` callback would.

use std::collections::HashMap;
use std::sync::Arc;

use super::buffer::AudioBuffer;

/// Opaque node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Biquad response types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadType {
    Lowpass,
    Highpass,
    Lowshelf,
    Highshelf,
    Peaking,
}

/// Biquad filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub kind: BiquadType,
    pub frequency: f32,
    pub q: f32,
    pub gain: f32,
}

impl Biquad {
    pub fn new(kind: BiquadType, frequency: f32) -> Self {
        Self {
            kind,
            frequency,
            q: 1.0,
            gain: 0.0,
        }
    }
}

/// Playback cursor of a one-shot buffer source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceState {
    /// Created, `start` not yet called
    Idle,
    /// Advancing; `stop_at` is the buffer position where it ends
    Playing { position: f64, stop_at: f64 },
    /// Stopped explicitly or ran out; can never be restarted
    Finished,
}

/// One-shot buffer playback node
#[derive(Debug, Clone)]
pub struct BufferSource {
    pub buffer: Option<Arc<AudioBuffer>>,
    pub playback_rate: f32,
    pub looping: bool,
    pub loop_start: f64,
    pub loop_end: f64,
    state: SourceState,
}

impl BufferSource {
    pub fn new() -> Self {
        Self {
            buffer: None,
            playback_rate: 1.0,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            state: SourceState::Idle,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Current position inside the buffer, in seconds
    pub fn position(&self) -> Option<f64> {
        match self.state {
            SourceState::Playing { position, .. } => Some(position),
            _ => None,
        }
    }

    fn buffer_duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    /// Move the cursor forward. Returns true when the source just ended.
    fn advance(&mut self, dt: f64) -> bool {
        let SourceState::Playing { position, stop_at } = self.state else {
            return false;
        };
        let duration = self.buffer_duration();
        let mut position = position + dt * self.playback_rate.max(0.0) as f64;

        if self.looping && duration > 0.0 {
            let (start, end) = if self.loop_end > self.loop_start && self.loop_end > 0.0 {
                (self.loop_start, self.loop_end.min(duration))
            } else {
                (0.0, duration)
            };
            let span = end - start;
            if span > 0.0 && position >= end {
                position = start + (position - start) % span;
            }
            self.state = SourceState::Playing { position, stop_at };
            return false;
        }

        if position >= stop_at {
            self.state = SourceState::Finished;
            return true;
        }
        self.state = SourceState::Playing { position, stop_at };
        false
    }
}

impl Default for BufferSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Node kinds known to the graph
#[derive(Debug, Clone)]
pub enum AudioNode {
    Destination,
    BufferSource(BufferSource),
    Gain { gain: f32 },
    Analyser { fft_size: usize },
    DynamicsCompressor { threshold: f32, ratio: f32 },
    Biquad(Biquad),
    StereoPanner { pan: f32 },
    WaveShaper { curve: Vec<f32> },
    Convolver { buffer: Option<Arc<AudioBuffer>> },
}

impl AudioNode {
    pub fn gain(value: f32) -> Self {
        AudioNode::Gain { gain: value }
    }

    pub fn analyser() -> Self {
        AudioNode::Analyser { fft_size: 2048 }
    }

    pub fn compressor() -> Self {
        AudioNode::DynamicsCompressor {
            threshold: -24.0,
            ratio: 12.0,
        }
    }
}

/// Node arena plus edge list
#[derive(Debug, Default)]
pub struct AudioGraph {
    nodes: HashMap<NodeId, AudioNode>,
    edges: Vec<(NodeId, NodeId)>,
    next_id: u32,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a node and return its handle
    pub fn create(&mut self, node: AudioNode) -> NodeId {
        let id = NodeId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node together with every edge touching it
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.nodes.remove(&id).is_some() {
            self.edges.retain(|(from, to)| *from != id && *to != id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&AudioNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut AudioNode> {
        self.nodes.get_mut(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect `from` into `to`. Missing nodes and duplicate edges are rejected.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> bool {
        if !self.contains(from) || !self.contains(to) || self.is_connected(from, to) {
            return false;
        }
        self.edges.push((from, to));
        true
    }

    /// Drop every outbound edge of `from`. Returns how many were removed.
    pub fn disconnect(&mut self, from: NodeId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|(f, _)| *f != from);
        before - self.edges.len()
    }

    /// Drop a single edge
    pub fn disconnect_from(&mut self, from: NodeId, to: NodeId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| *edge != (from, to));
        self.edges.len() < before
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.iter().any(|edge| *edge == (from, to))
    }

    /// Targets of `from`, in connection order
    pub fn outputs(&self, from: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Sources feeding `to`
    pub fn inputs(&self, to: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, t)| *t == to)
            .map(|(from, _)| *from)
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Walk single-output links from `from` and return the visited path.
    /// Stops at a node with zero or several outputs, or on a cycle.
    pub fn route(&self, from: NodeId) -> Vec<NodeId> {
        let mut path = vec![from];
        let mut current = from;
        loop {
            let outputs = self.outputs(current);
            if outputs.len() != 1 || path.contains(&outputs[0]) {
                return path;
            }
            current = outputs[0];
            path.push(current);
        }
    }

    pub fn gain_value(&self, id: NodeId) -> Option<f32> {
        match self.nodes.get(&id) {
            Some(AudioNode::Gain { gain }) => Some(*gain),
            _ => None,
        }
    }

    pub fn set_gain(&mut self, id: NodeId, value: f32) -> bool {
        match self.nodes.get_mut(&id) {
            Some(AudioNode::Gain { gain }) => {
                *gain = value;
                true
            }
            _ => false,
        }
    }

    pub fn buffer_source(&self, id: NodeId) -> Option<&BufferSource> {
        match self.nodes.get(&id) {
            Some(AudioNode::BufferSource(source)) => Some(source),
            _ => None,
        }
    }

    pub fn buffer_source_mut(&mut self, id: NodeId) -> Option<&mut BufferSource> {
        match self.nodes.get_mut(&id) {
            Some(AudioNode::BufferSource(source)) => Some(source),
            _ => None,
        }
    }

    pub fn biquad_mut(&mut self, id: NodeId) -> Option<&mut Biquad> {
        match self.nodes.get_mut(&id) {
            Some(AudioNode::Biquad(biquad)) => Some(biquad),
            _ => None,
        }
    }

    /// Start a buffer source at `offset` seconds, optionally for `duration` seconds.
    ///
    /// A source can only be started once; later calls return false.
    pub fn start(&mut self, id: NodeId, offset: f64, duration: Option<f64>) -> bool {
        let Some(source) = self.buffer_source_mut(id) else {
            return false;
        };
        if source.state != SourceState::Idle {
            tracing::warn!("Buffer source {} cannot be started twice", id.raw());
            return false;
        }
        let buffer_duration = source.buffer_duration();
        let offset = offset.clamp(0.0, buffer_duration);
        let stop_at = match duration {
            Some(d) => (offset + d.max(0.0)).min(buffer_duration),
            None => buffer_duration,
        };
        source.state = SourceState::Playing {
            position: offset,
            stop_at,
        };
        true
    }

    /// Stop a buffer source without reporting it as ended
    pub fn stop(&mut self, id: NodeId) -> bool {
        match self.buffer_source_mut(id) {
            Some(source) => {
                source.state = SourceState::Finished;
                true
            }
            None => false,
        }
    }

    /// Advance every playing source by `dt` seconds of context time.
    /// Returns the sources that reached their end during this step.
    pub fn advance(&mut self, dt: f64) -> Vec<NodeId> {
        let mut ended: Vec<NodeId> = self
            .nodes
            .iter_mut()
            .filter_map(|(id, node)| match node {
                AudioNode::BufferSource(source) => source.advance(dt).then_some(*id),
                _ => None,
            })
            .collect();
        ended.sort();
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(graph: &mut AudioGraph, seconds: f64) -> NodeId {
        let mut source = BufferSource::new();
        source.buffer = Some(Arc::new(AudioBuffer::new(
            1,
            (seconds * 1000.0) as usize,
            1000,
        )));
        graph.create(AudioNode::BufferSource(source))
    }

    #[test]
    fn test_connect_rejects_duplicates() {
        let mut graph = AudioGraph::new();
        let a = graph.create(AudioNode::gain(1.0));
        let b = graph.create(AudioNode::gain(1.0));
        assert!(graph.connect(a, b));
        assert!(!graph.connect(a, b));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_connect_rejects_missing_nodes() {
        let mut graph = AudioGraph::new();
        let a = graph.create(AudioNode::gain(1.0));
        let b = graph.create(AudioNode::gain(1.0));
        graph.remove(b);
        assert!(!graph.connect(a, b));
    }

    #[test]
    fn test_disconnect_only_touches_outbound_edges() {
        let mut graph = AudioGraph::new();
        let a = graph.create(AudioNode::gain(1.0));
        let b = graph.create(AudioNode::gain(1.0));
        let c = graph.create(AudioNode::gain(1.0));
        graph.connect(a, b);
        graph.connect(b, c);
        assert_eq!(graph.disconnect(b), 1);
        assert!(graph.is_connected(a, b));
        assert!(!graph.is_connected(b, c));
    }

    #[test]
    fn test_remove_drops_incident_edges() {
        let mut graph = AudioGraph::new();
        let a = graph.create(AudioNode::gain(1.0));
        let b = graph.create(AudioNode::gain(1.0));
        let c = graph.create(AudioNode::gain(1.0));
        graph.connect(a, b);
        graph.connect(b, c);
        graph.remove(b);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_route_follows_chain() {
        let mut graph = AudioGraph::new();
        let a = graph.create(AudioNode::gain(1.0));
        let b = graph.create(AudioNode::analyser());
        let c = graph.create(AudioNode::Destination);
        graph.connect(a, b);
        graph.connect(b, c);
        assert_eq!(graph.route(a), vec![a, b, c]);
    }

    #[test]
    fn test_source_ends_once() {
        let mut graph = AudioGraph::new();
        let source = source_with(&mut graph, 0.1);
        assert!(graph.start(source, 0.0, None));
        assert!(graph.advance(0.05).is_empty());
        assert_eq!(graph.advance(0.06), vec![source]);
        assert!(graph.advance(0.1).is_empty());
    }

    #[test]
    fn test_advance_reports_every_ended_source_in_order() {
        let mut graph = AudioGraph::new();
        let long = source_with(&mut graph, 1.0);
        let a = source_with(&mut graph, 0.1);
        let gain = graph.create(AudioNode::gain(1.0));
        let b = source_with(&mut graph, 0.2);
        for source in [long, a, b] {
            graph.start(source, 0.0, None);
        }
        assert_eq!(graph.advance(0.3), vec![a, b]);
        assert!(graph.contains(gain));
        assert_eq!(graph.advance(1.0), vec![long]);
    }

    #[test]
    fn test_source_cannot_restart() {
        let mut graph = AudioGraph::new();
        let source = source_with(&mut graph, 0.1);
        assert!(graph.start(source, 0.0, None));
        assert!(!graph.start(source, 0.0, None));
    }

    #[test]
    fn test_source_respects_playback_rate_and_duration() {
        let mut graph = AudioGraph::new();
        let source = source_with(&mut graph, 1.0);
        graph.buffer_source_mut(source).unwrap().playback_rate = 2.0;
        graph.start(source, 0.2, Some(0.4));
        assert!(graph.advance(0.1).is_empty());
        assert_eq!(graph.advance(0.11), vec![source]);
    }

    #[test]
    fn test_stopped_source_never_reports_end() {
        let mut graph = AudioGraph::new();
        let source = source_with(&mut graph, 0.1);
        graph.start(source, 0.0, None);
        graph.stop(source);
        assert!(graph.advance(1.0).is_empty());
    }

    #[test]
    fn test_looping_source_wraps() {
        let mut graph = AudioGraph::new();
        let source = source_with(&mut graph, 0.1);
        graph.buffer_source_mut(source).unwrap().looping = true;
        graph.start(source, 0.0, None);
        assert!(graph.advance(0.25).is_empty());
        let position = graph.buffer_source(source).unwrap().position().unwrap();
        assert!((position - 0.05).abs() < 1e-9);
    }
}
