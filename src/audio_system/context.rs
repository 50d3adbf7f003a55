/// Global mixer
///
/// Wraps the platform context with the master chain
/// `analyser -> [filters] -> compressor -> destination` and the global
/// volume/speed/mute/pause settings every instance multiplies into its output.
use std::sync::Arc;

use super::buffer::{decode_audio_data, AudioBuffer};
use super::graph::{AudioGraph, AudioNode, NodeId};
use super::platform::{ContextState, PlatformContext};
use crate::error::{SoundError, SoundResult};
use crate::filters::{Filter, Filterable};
use crate::media::BackendKind;

/// Change notifications waiting to be broadcast to live instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Refresh {
    /// Volume, speed or mute changed
    pub settings: bool,
    /// Pause state changed
    pub paused: bool,
}

impl Refresh {
    pub fn is_empty(&self) -> bool {
        !self.settings && !self.paused
    }
}

#[derive(Debug)]
pub struct AudioContext {
    platform: PlatformContext,
    splice: Filterable,
    analyser: NodeId,
    compressor: NodeId,
    backend: BackendKind,
    volume: f32,
    speed: f32,
    muted: bool,
    paused: bool,
    unlocked: bool,
    pending: Refresh,
}

impl AudioContext {
    pub fn new(sample_rate: u32, require_gesture: bool, backend: BackendKind) -> Self {
        let mut platform = PlatformContext::new(sample_rate, require_gesture);
        let destination = platform.destination();
        let graph = platform.graph_mut();
        let analyser = graph.create(AudioNode::analyser());
        let compressor = graph.create(AudioNode::compressor());
        graph.connect(compressor, destination);
        let splice = Filterable::new(graph, analyser, compressor);

        tracing::debug!(
            "Audio context created ({} Hz, backend {:?}, gesture unlock {})",
            sample_rate,
            backend,
            require_gesture
        );

        Self {
            platform,
            splice,
            analyser,
            compressor,
            backend,
            volume: 1.0,
            speed: 1.0,
            muted: false,
            paused: false,
            unlocked: !require_gesture,
            pending: Refresh::default(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Backend for media created from now on. Master filters are dropped when
    /// switching to the element backend and are not restored on switching back.
    pub fn set_backend(&mut self, backend: BackendKind) {
        if backend == BackendKind::Element {
            if let Some(count) = self.splice.filters().map(|f| f.len()) {
                tracing::warn!(
                    "Dropping {} master filter(s): the element backend does not support filters",
                    count
                );
            }
            self.splice.set_filters(self.platform.graph_mut(), None);
        }
        self.backend = backend;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
        self.pending.settings = true;
    }

    /// Global volume after mute: `muted ? 0 : volume`
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
        self.pending.settings = true;
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.pending.settings = true;
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.set_muted(!self.muted);
        self.muted
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Suspend or resume the platform clock along with the flag
    pub fn set_paused(&mut self, paused: bool) {
        if paused {
            self.platform.suspend();
        } else if self.unlocked {
            self.platform.resume();
        }
        self.paused = paused;
        self.pending.paused = true;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.set_paused(!self.paused);
        self.paused
    }

    /// Take the refresh notifications accumulated since the last call
    pub fn take_refresh(&mut self) -> Refresh {
        std::mem::take(&mut self.pending)
    }

    /// Node instance chains connect into
    pub fn destination(&self) -> NodeId {
        self.analyser
    }

    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    pub fn compressor(&self) -> NodeId {
        self.compressor
    }

    pub fn filters(&self) -> Option<&[Filter]> {
        self.splice.filters()
    }

    /// Master filters. The element backend has no node graph to splice into.
    pub fn set_filters(&mut self, filters: Option<Vec<Filter>>) {
        if self.backend == BackendKind::Element {
            if filters.as_ref().map_or(false, |f| !f.is_empty()) {
                tracing::warn!("Filters are not supported with the element backend");
            }
            return;
        }
        self.splice.set_filters(self.platform.graph_mut(), filters);
    }

    pub fn platform(&self) -> &PlatformContext {
        &self.platform
    }

    pub fn graph(&self) -> &AudioGraph {
        self.platform.graph()
    }

    pub fn graph_mut(&mut self) -> &mut AudioGraph {
        self.platform.graph_mut()
    }

    pub fn current_time(&self) -> f64 {
        self.platform.current_time()
    }

    pub fn sample_rate(&self) -> u32 {
        self.platform.sample_rate()
    }

    pub fn state(&self) -> ContextState {
        self.platform.state()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Gesture hook: play a one-sample silent buffer and resume the context.
    /// Returns true once the context reports running; later calls are no-ops.
    pub fn unlock(&mut self) -> bool {
        if self.unlocked {
            return true;
        }
        if self.platform.state() == ContextState::Closed {
            return false;
        }

        let buffer = Arc::new(self.platform.create_buffer(1, 1));
        let source = self.platform.create_buffer_source(Some(buffer));
        let destination = self.platform.destination();
        let graph = self.platform.graph_mut();
        graph.connect(source, destination);
        graph.start(source, 0.0, None);
        graph.remove(source);

        if !self.paused {
            self.platform.resume();
        }
        // a paused context stays suspended but is unlocked for later resumes
        self.unlocked = true;
        tracing::info!("Audio context unlocked");
        true
    }

    /// Decode compressed bytes on a background thread, reporting through `callback`
    pub fn decode<F>(&self, bytes: Arc<Vec<u8>>, extension: Option<String>, callback: F)
    where
        F: FnOnce(SoundResult<AudioBuffer>) + Send + 'static,
    {
        if self.platform.state() == ContextState::Closed {
            callback(Err(SoundError::Closed));
            return;
        }
        std::thread::spawn(move || {
            let result = decode_audio_data(&bytes, extension.as_deref());
            if let Err(err) = &result {
                tracing::warn!("Decode failed: {}", err);
            }
            callback(result);
        });
    }

    /// Move the platform clock; returns buffer sources that ended naturally
    pub fn advance(&mut self, dt: f64) -> Vec<NodeId> {
        self.platform.advance(dt)
    }

    /// Tear down the master chain and close the platform context
    pub fn close(&mut self) {
        let graph = self.platform.graph_mut();
        self.splice.destroy(graph);
        graph.disconnect(self.compressor);
        self.platform.close();
        tracing::info!("Audio context closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::StereoFilter;

    fn context() -> AudioContext {
        AudioContext::new(44100, false, BackendKind::WebAudio)
    }

    #[test]
    fn test_master_chain() {
        let ctx = context();
        let destination = ctx.platform().destination();
        assert_eq!(
            ctx.graph().route(ctx.destination()),
            vec![ctx.analyser(), ctx.compressor(), destination]
        );
    }

    #[test]
    fn test_mute_zeroes_effective_volume() {
        let mut ctx = context();
        ctx.set_volume(0.5);
        assert_eq!(ctx.effective_volume(), 0.5);
        assert!(ctx.toggle_mute());
        assert_eq!(ctx.effective_volume(), 0.0);
        assert!(!ctx.toggle_mute());
        assert_eq!(ctx.effective_volume(), 0.5);
    }

    #[test]
    fn test_setters_queue_refresh() {
        let mut ctx = context();
        assert!(ctx.take_refresh().is_empty());
        ctx.set_speed(2.0);
        ctx.toggle_pause();
        let refresh = ctx.take_refresh();
        assert!(refresh.settings);
        assert!(refresh.paused);
        assert!(ctx.take_refresh().is_empty());
    }

    #[test]
    fn test_pause_suspends_clock() {
        let mut ctx = context();
        ctx.set_paused(true);
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.advance(1.0);
        assert_eq!(ctx.current_time(), 0.0);
        ctx.set_paused(false);
        ctx.advance(1.0);
        assert_eq!(ctx.current_time(), 1.0);
    }

    #[test]
    fn test_unlock_resumes_gesture_locked_context() {
        let mut ctx = AudioContext::new(44100, true, BackendKind::WebAudio);
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.set_paused(false);
        assert_eq!(ctx.state(), ContextState::Suspended);

        let nodes = ctx.graph().node_count();
        assert!(ctx.unlock());
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.graph().node_count(), nodes);
        assert!(ctx.unlock());
    }

    #[test]
    fn test_master_filters() {
        let mut ctx = context();
        let stereo = StereoFilter::new(ctx.graph_mut(), 0.5).filter();
        ctx.set_filters(Some(vec![stereo.clone()]));
        assert_eq!(ctx.filters().map(|f| f.len()), Some(1));
        assert!(ctx
            .graph()
            .is_connected(ctx.analyser(), stereo.destination().unwrap()));

        ctx.set_filters(None);
        assert!(ctx.graph().is_connected(ctx.analyser(), ctx.compressor()));
    }

    #[test]
    fn test_element_backend_ignores_filters() {
        let mut ctx = AudioContext::new(44100, false, BackendKind::Element);
        let stereo = StereoFilter::new(ctx.graph_mut(), 0.5).filter();
        ctx.set_filters(Some(vec![stereo]));
        assert!(ctx.filters().is_none());
    }

    #[test]
    fn test_switching_to_element_drops_master_filters() {
        let mut ctx = context();
        let stereo = StereoFilter::new(ctx.graph_mut(), 0.5).filter();
        ctx.set_filters(Some(vec![stereo.clone()]));

        ctx.set_backend(BackendKind::Element);
        assert!(ctx.filters().is_none());
        assert!(ctx.graph().is_connected(ctx.analyser(), ctx.compressor()));
        assert!(!ctx
            .graph()
            .is_connected(ctx.analyser(), stereo.destination().unwrap()));

        ctx.set_backend(BackendKind::WebAudio);
        assert!(ctx.filters().is_none());
    }

    #[test]
    fn test_decode_reports_through_callback() {
        let ctx = context();
        let (tx, rx) = crossbeam_channel::bounded(1);
        ctx.decode(Arc::new(b"nope".to_vec()), None, move |result| {
            let _ = tx.send(result.is_err());
        });
        assert!(rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap());
    }
}
