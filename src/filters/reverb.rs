/// Convolution reverb with a generated impulse
use std::sync::Arc;

use rand::Rng;

use crate::audio_system::{AudioBuffer, AudioGraph, AudioNode};

use super::filter::Filter;

#[derive(Debug, Clone)]
pub struct ReverbFilter {
    filter: Filter,
    seconds: f32,
    decay: f32,
    reverse: bool,
    sample_rate: u32,
}

impl ReverbFilter {
    /// `seconds` is clamped to 1..=50, `decay` to 0..=100
    pub fn new(
        graph: &mut AudioGraph,
        sample_rate: u32,
        seconds: f32,
        decay: f32,
        reverse: bool,
    ) -> Self {
        let node = graph.create(AudioNode::Convolver { buffer: None });
        let mut reverb = Self {
            filter: Filter::new(node, None),
            seconds: seconds.clamp(1.0, 50.0),
            decay: decay.clamp(0.0, 100.0),
            reverse,
            sample_rate: sample_rate.max(1),
        };
        reverb.rebuild(graph);
        reverb
    }

    pub fn seconds(&self) -> f32 {
        self.seconds
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn set_seconds(&mut self, graph: &mut AudioGraph, seconds: f32) {
        self.seconds = seconds.clamp(1.0, 50.0);
        self.rebuild(graph);
    }

    pub fn set_decay(&mut self, graph: &mut AudioGraph, decay: f32) {
        self.decay = decay.clamp(0.0, 100.0);
        self.rebuild(graph);
    }

    pub fn set_reverse(&mut self, graph: &mut AudioGraph, reverse: bool) {
        self.reverse = reverse;
        self.rebuild(graph);
    }

    /// Regenerate the stereo noise impulse with the current settings
    fn rebuild(&mut self, graph: &mut AudioGraph) {
        let length = (self.sample_rate as f32 * self.seconds) as usize;
        let mut rng = rand::thread_rng();
        let mut channels = vec![vec![0.0f32; length]; 2];
        for i in 0..length {
            let n = if self.reverse { length - i } else { i };
            let envelope = (1.0 - n as f32 / length as f32).powf(self.decay);
            for channel in channels.iter_mut() {
                channel[i] = rng.gen_range(-1.0f32..1.0) * envelope;
            }
        }
        let impulse = Arc::new(AudioBuffer::from_channels(channels, self.sample_rate));
        if let Some(AudioNode::Convolver { buffer }) = self
            .filter
            .destination()
            .and_then(|node| graph.node_mut(node))
        {
            *buffer = Some(impulse);
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter.clone()
    }
}
