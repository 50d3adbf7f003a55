use std::any::Any;
use std::sync::Arc;

use crate::audio_system::AudioContext;
use crate::filters::Filter;
use crate::media::{BackendKind, LoadedAudio, Media, MediaInstance};

use super::instance::ElementInstance;

/// Element-backed media: keeps the compressed bytes for playback and the
/// decoded length for timing
#[derive(Debug, Default)]
pub struct ElementMedia {
    bytes: Option<Arc<Vec<u8>>>,
    duration: f64,
    loaded: bool,
}

impl ElementMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Option<&Arc<Vec<u8>>> {
        self.bytes.as_ref()
    }
}

impl Media for ElementMedia {
    fn kind(&self) -> BackendKind {
        BackendKind::Element
    }

    fn is_playable(&self) -> bool {
        self.loaded
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn filters(&self) -> Option<&[Filter]> {
        None
    }

    fn set_filters(&mut self, _ctx: &mut AudioContext, filters: Option<Vec<Filter>>) {
        if filters.map_or(false, |f| !f.is_empty()) {
            tracing::warn!("Filters are not supported with the element backend");
        }
    }

    fn attach(&mut self, _ctx: &mut AudioContext, audio: LoadedAudio) {
        self.duration = audio.buffer.duration();
        self.bytes = audio.bytes;
        self.loaded = true;
    }

    fn create(&self) -> Box<dyn MediaInstance> {
        Box::new(ElementInstance::new())
    }

    fn destroy(&mut self, _ctx: &mut AudioContext) {
        self.bytes = None;
        self.duration = 0.0;
        self.loaded = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::AudioBuffer;

    #[test]
    fn test_attach_makes_playable() {
        let mut ctx = AudioContext::new(1000, false, BackendKind::Element);
        let mut media = ElementMedia::new();
        assert!(!media.is_playable());
        media.attach(
            &mut ctx,
            LoadedAudio {
                bytes: Some(Arc::new(vec![1, 2, 3])),
                buffer: Arc::new(AudioBuffer::new(1, 500, 1000)),
            },
        );
        assert!(media.is_playable());
        assert_eq!(media.duration(), 0.5);
        assert_eq!(media.bytes().map(|b| b.len()), Some(3));

        media.destroy(&mut ctx);
        assert!(!media.is_playable());
    }

    #[test]
    fn test_filters_are_ignored() {
        let mut ctx = AudioContext::new(1000, false, BackendKind::Element);
        let mut media = ElementMedia::new();
        let node = ctx.graph_mut().create(crate::audio_system::AudioNode::gain(1.0));
        media.set_filters(&mut ctx, Some(vec![Filter::new(node, None)]));
        assert!(media.filters().is_none());
    }
}
