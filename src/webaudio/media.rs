/// Graph-backed media
///
/// Holds the decoded buffer and the template chain
/// `buffer source -> analyser -> [filters] -> gain -> context destination`.
/// The template source is never started; instances clone it.
use std::any::Any;
use std::sync::Arc;

use crate::audio_system::{AudioBuffer, AudioContext, AudioGraph, AudioNode, BufferSource, NodeId};
use crate::filters::{Filter, Filterable};
use crate::media::{BackendKind, LoadedAudio, Media, MediaInstance};

use super::instance::WebAudioInstance;

/// Handles an instance needs to clone the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    template: NodeId,
    destination: NodeId,
}

impl ChainLink {
    /// Where cloned instance chains connect (the media's filter splice input)
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Copy the template's buffer, rate and loop flag onto a new one-shot source
    /// feeding a private gain: `clone -> gain -> destination`.
    ///
    /// Returns `(source, gain)`, or `None` once the template is gone.
    pub fn clone_buffer_source(&self, graph: &mut AudioGraph) -> Option<(NodeId, NodeId)> {
        let template = graph.buffer_source(self.template)?;
        let mut source = BufferSource::new();
        source.buffer = template.buffer.clone();
        source.playback_rate = template.playback_rate;
        source.looping = template.looping;

        let source = graph.create(AudioNode::BufferSource(source));
        let gain = graph.create(AudioNode::gain(1.0));
        graph.connect(source, gain);
        graph.connect(gain, self.destination);
        Some((source, gain))
    }
}

/// Template chain owned by a media
#[derive(Debug)]
pub struct NodeChain {
    buffer_source: NodeId,
    analyser: NodeId,
    gain: NodeId,
    splice: Filterable,
}

impl NodeChain {
    pub fn new(ctx: &mut AudioContext) -> Self {
        let destination = ctx.destination();
        let graph = ctx.graph_mut();
        let buffer_source = graph.create(AudioNode::BufferSource(BufferSource::new()));
        let analyser = graph.create(AudioNode::analyser());
        let gain = graph.create(AudioNode::gain(1.0));

        graph.connect(buffer_source, analyser);
        graph.connect(gain, destination);
        let splice = Filterable::new(graph, analyser, gain);

        Self {
            buffer_source,
            analyser,
            gain,
            splice,
        }
    }

    pub fn link(&self) -> ChainLink {
        ChainLink {
            template: self.buffer_source,
            destination: self.analyser,
        }
    }

    pub fn buffer_source(&self) -> NodeId {
        self.buffer_source
    }

    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    pub fn gain(&self) -> NodeId {
        self.gain
    }

    pub fn splice(&self) -> &Filterable {
        &self.splice
    }

    fn destroy(&mut self, graph: &mut AudioGraph) {
        self.splice.destroy(graph);
        for node in [self.buffer_source, self.analyser, self.gain] {
            graph.remove(node);
        }
    }
}

#[derive(Debug)]
pub struct WebAudioMedia {
    chain: Option<NodeChain>,
    buffer: Option<Arc<AudioBuffer>>,
}

impl WebAudioMedia {
    pub fn new(ctx: &mut AudioContext) -> Self {
        Self {
            chain: Some(NodeChain::new(ctx)),
            buffer: None,
        }
    }

    pub fn chain(&self) -> Option<&NodeChain> {
        self.chain.as_ref()
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }
}

impl Media for WebAudioMedia {
    fn kind(&self) -> BackendKind {
        BackendKind::WebAudio
    }

    fn is_playable(&self) -> bool {
        self.chain.is_some() && self.buffer.is_some()
    }

    fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    fn filters(&self) -> Option<&[Filter]> {
        self.chain.as_ref().and_then(|chain| chain.splice.filters())
    }

    fn set_filters(&mut self, ctx: &mut AudioContext, filters: Option<Vec<Filter>>) {
        if let Some(chain) = self.chain.as_mut() {
            chain.splice.set_filters(ctx.graph_mut(), filters);
        }
    }

    fn attach(&mut self, ctx: &mut AudioContext, audio: LoadedAudio) {
        let Some(chain) = self.chain.as_ref() else {
            tracing::warn!("Ignoring audio loaded into a destroyed media");
            return;
        };
        if let Some(template) = ctx.graph_mut().buffer_source_mut(chain.buffer_source) {
            template.buffer = Some(audio.buffer.clone());
        }
        self.buffer = Some(audio.buffer);
    }

    fn create(&self) -> Box<dyn MediaInstance> {
        Box::new(WebAudioInstance::new())
    }

    fn destroy(&mut self, ctx: &mut AudioContext) {
        if let Some(mut chain) = self.chain.take() {
            chain.destroy(ctx.graph_mut());
        }
        self.buffer = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
