/// Band-limited "telephone line" filter
use crate::audio_system::{AudioGraph, AudioNode, Biquad, BiquadType};

use super::filter::Filter;

/// Two lowpass stages at 2 kHz followed by two highpass stages at 500 Hz
pub fn telephone_filter(graph: &mut AudioGraph) -> Filter {
    let stages = [
        (BiquadType::Lowpass, 2000.0),
        (BiquadType::Lowpass, 2000.0),
        (BiquadType::Highpass, 500.0),
        (BiquadType::Highpass, 500.0),
    ];
    let chain: Vec<_> = stages
        .iter()
        .map(|(kind, frequency)| {
            let mut biquad = Biquad::new(*kind, *frequency);
            biquad.q = 0.0;
            graph.create(AudioNode::Biquad(biquad))
        })
        .collect();
    for pair in chain.windows(2) {
        graph.connect(pair[0], pair[1]);
    }
    Filter::from_chain(chain)
}
