/// Ten-band graphic equalizer
use crate::audio_system::{AudioGraph, AudioNode, Biquad, BiquadType, NodeId};

use super::filter::Filter;

/// Band centre frequencies in Hz
pub const BANDS: [f32; 10] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Series of biquads: lowshelf, eight peaking bands, highshelf
#[derive(Debug, Clone)]
pub struct EqualizerFilter {
    filter: Filter,
    bands: Vec<NodeId>,
}

impl EqualizerFilter {
    /// Create the equalizer with one gain (dB) per band
    pub fn new(graph: &mut AudioGraph, gains: [f32; 10]) -> Self {
        let last = BANDS.len() - 1;
        let bands: Vec<NodeId> = BANDS
            .iter()
            .zip(gains)
            .enumerate()
            .map(|(i, (frequency, gain))| {
                let kind = match i {
                    0 => BiquadType::Lowshelf,
                    i if i == last => BiquadType::Highshelf,
                    _ => BiquadType::Peaking,
                };
                let mut biquad = Biquad::new(kind, *frequency);
                biquad.gain = gain;
                graph.create(AudioNode::Biquad(biquad))
            })
            .collect();
        for pair in bands.windows(2) {
            graph.connect(pair[0], pair[1]);
        }
        Self {
            filter: Filter::from_chain(bands.clone()),
            bands,
        }
    }

    /// Flat response
    pub fn flat(graph: &mut AudioGraph) -> Self {
        Self::new(graph, [0.0; 10])
    }

    fn band_node(&self, frequency: f32) -> Option<NodeId> {
        BANDS
            .iter()
            .position(|f| (*f - frequency).abs() < f32::EPSILON)
            .and_then(|i| self.bands.get(i).copied())
    }

    /// Set one band's gain; `frequency` must be one of [`BANDS`]
    pub fn set_gain(&mut self, graph: &mut AudioGraph, frequency: f32, gain: f32) {
        let node = self.band_node(frequency);
        assert!(node.is_some(), "No equalizer band at {} Hz", frequency);
        if let Some(biquad) = node.and_then(|n| graph.biquad_mut(n)) {
            biquad.gain = gain;
        }
    }

    pub fn gain(&self, graph: &AudioGraph, frequency: f32) -> Option<f32> {
        match self.band_node(frequency).and_then(|n| graph.node(n)) {
            Some(AudioNode::Biquad(biquad)) => Some(biquad.gain),
            _ => None,
        }
    }

    /// Flatten every band
    pub fn reset(&mut self, graph: &mut AudioGraph) {
        for node in &self.bands {
            if let Some(biquad) = graph.biquad_mut(*node) {
                biquad.gain = 0.0;
            }
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_node_filter_has_distinct_ends() {
        let mut graph = AudioGraph::new();
        let eq = EqualizerFilter::flat(&mut graph);
        let filter = eq.filter();
        assert_ne!(filter.destination(), filter.source());
        assert_eq!(graph.route(filter.destination().unwrap()).len(), 10);
    }

    #[test]
    fn test_set_and_reset_gain() {
        let mut graph = AudioGraph::new();
        let mut eq = EqualizerFilter::flat(&mut graph);
        eq.set_gain(&mut graph, 1000.0, 6.0);
        assert_eq!(eq.gain(&graph, 1000.0), Some(6.0));
        eq.reset(&mut graph);
        assert_eq!(eq.gain(&graph, 1000.0), Some(0.0));
    }

    #[test]
    #[should_panic(expected = "No equalizer band")]
    fn test_unknown_band_panics() {
        let mut graph = AudioGraph::new();
        let mut eq = EqualizerFilter::flat(&mut graph);
        eq.set_gain(&mut graph, 440.0, 3.0);
    }
}
