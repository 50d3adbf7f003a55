/// Platform audio context
///
/// Owns the node graph, its destination and the context clock. The clock only
/// moves while the context is running, which is what keeps instance progress
/// frozen while everything is paused.
use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::graph::{AudioGraph, AudioNode, BufferSource, NodeId};

/// Lifecycle of the platform context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Software stand-in for a browser `AudioContext`
#[derive(Debug)]
pub struct PlatformContext {
    graph: AudioGraph,
    destination: NodeId,
    current_time: f64,
    sample_rate: u32,
    state: ContextState,
}

impl PlatformContext {
    /// Create a context. With `require_gesture` it starts suspended until
    /// something resumes it (normally the first pointer/touch unlock).
    pub fn new(sample_rate: u32, require_gesture: bool) -> Self {
        let mut graph = AudioGraph::new();
        let destination = graph.create(AudioNode::Destination);
        Self {
            graph,
            destination,
            current_time: 0.0,
            sample_rate: sample_rate.max(1),
            state: if require_gesture {
                ContextState::Suspended
            } else {
                ContextState::Running
            },
        }
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AudioGraph {
        &mut self.graph
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Context clock in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            self.state = ContextState::Running;
        }
    }

    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    /// Allocate a silent buffer at the context rate
    pub fn create_buffer(&self, channels: usize, length: usize) -> AudioBuffer {
        AudioBuffer::new(channels, length, self.sample_rate)
    }

    /// Create an unstarted buffer-source node
    pub fn create_buffer_source(&mut self, buffer: Option<Arc<AudioBuffer>>) -> NodeId {
        let mut source = BufferSource::new();
        source.buffer = buffer;
        self.graph.create(AudioNode::BufferSource(source))
    }

    /// Advance the clock by `dt` seconds. Returns sources that ended naturally.
    pub fn advance(&mut self, dt: f64) -> Vec<NodeId> {
        if self.state != ContextState::Running || dt <= 0.0 {
            return Vec::new();
        }
        self.current_time += dt;
        self.graph.advance(dt)
    }
}
