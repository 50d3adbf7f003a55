/// Wave-shaping distortion filter
use crate::audio_system::{AudioGraph, AudioNode};

use super::filter::Filter;

const CURVE_SAMPLES: usize = 44100;

/// Build the shaping curve for a distortion amount (0 = clean)
pub fn distortion_curve(amount: f32) -> Vec<f32> {
    let scaled = amount.max(0.0) * 1000.0;
    let deg = std::f32::consts::PI / 180.0;
    (0..CURVE_SAMPLES)
        .map(|i| {
            let x = i as f32 * 2.0 / CURVE_SAMPLES as f32 - 1.0;
            (3.0 + scaled) * x * 20.0 * deg / (std::f32::consts::PI + scaled * x.abs())
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DistortionFilter {
    filter: Filter,
    amount: f32,
}

impl DistortionFilter {
    pub fn new(graph: &mut AudioGraph, amount: f32) -> Self {
        let amount = amount.max(0.0);
        let node = graph.create(AudioNode::WaveShaper {
            curve: distortion_curve(amount),
        });
        Self {
            filter: Filter::new(node, None),
            amount,
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, graph: &mut AudioGraph, amount: f32) {
        self.amount = amount.max(0.0);
        if let Some(AudioNode::WaveShaper { curve }) = self
            .filter
            .destination()
            .and_then(|node| graph.node_mut(node))
        {
            *curve = distortion_curve(self.amount);
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter.clone()
    }
}
