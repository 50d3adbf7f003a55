/// Stereo panning filter
use crate::audio_system::{AudioGraph, AudioNode};

use super::filter::Filter;

/// Pans the signal between left (-1) and right (1)
#[derive(Debug, Clone)]
pub struct StereoFilter {
    filter: Filter,
    pan: f32,
}

impl StereoFilter {
    pub fn new(graph: &mut AudioGraph, pan: f32) -> Self {
        let pan = pan.clamp(-1.0, 1.0);
        let node = graph.create(AudioNode::StereoPanner { pan });
        Self {
            filter: Filter::new(node, None),
            pan,
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, graph: &mut AudioGraph, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        if let Some(AudioNode::StereoPanner { pan }) = self
            .filter
            .destination()
            .and_then(|node| graph.node_mut(node))
        {
            *pan = self.pan;
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter.clone()
    }
}
