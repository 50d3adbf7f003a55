/// Audio system module
///
/// The platform layer everything else sits on:
///
/// ```text
/// AudioContext (global mixer: volume, speed, mute, pause, unlock)
///   ├── master splice: analyser ─[filters]─> compressor ─> destination
///   └── PlatformContext
///         ├── AudioGraph (nodes + edges, one-shot buffer sources)
///         └── clock (advances only while running)
/// ```
pub mod buffer;
pub mod context;
pub mod graph;
pub mod platform;

pub use buffer::{decode_audio_data, AudioBuffer};
pub use context::{AudioContext, Refresh};
pub use graph::{AudioGraph, AudioNode, Biquad, BiquadType, BufferSource, NodeId, SourceState};
pub use platform::{ContextState, PlatformContext};
