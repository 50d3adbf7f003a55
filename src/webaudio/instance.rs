/// Graph-backed play instance
///
/// Each play clones the media's template source onto a fresh one-shot node
/// with a private gain, optionally routed through instance filters:
///
/// ```text
/// clone -> gain -> [instance filters] -> media splice input
/// ```
///
/// States: idle (pooled) -> playing -> paused -> playing -> ended/stopped -> idle.
/// Pausing tears the nodes down and remembers the elapsed position; resuming
/// clones again and restarts at that offset.
use std::any::Any;

use crate::audio_system::{AudioContext, NodeId};
use crate::filters::{Filter, Filterable};
use crate::media::{
    mix_speed, mix_volume, BackendKind, InstanceEvent, InstanceId, InstanceOptions, Media,
    MediaInstance, SoundSettings,
};

use super::media::{ChainLink, WebAudioMedia};

#[derive(Debug)]
pub struct WebAudioInstance {
    id: InstanceId,
    link: Option<ChainLink>,
    source: Option<NodeId>,
    gain: Option<NodeId>,
    splice: Option<Filterable>,
    filters: Option<Vec<Filter>>,
    volume: f32,
    speed: f32,
    looping: bool,
    muted: bool,
    paused: bool,
    paused_real: bool,
    active: bool,
    start: f64,
    end: Option<f64>,
    duration: f64,
    elapsed: f64,
    last_update: f64,
    progress: f64,
    events: Vec<InstanceEvent>,
}

impl WebAudioInstance {
    pub fn new() -> Self {
        Self::blank(InstanceId::next())
    }

    fn blank(id: InstanceId) -> Self {
        Self {
            id,
            link: None,
            source: None,
            gain: None,
            splice: None,
            filters: None,
            volume: 1.0,
            speed: 1.0,
            looping: false,
            muted: false,
            paused: false,
            paused_real: false,
            active: false,
            start: 0.0,
            end: None,
            duration: 0.0,
            elapsed: 0.0,
            last_update: 0.0,
            progress: 0.0,
            events: Vec::new(),
        }
    }

    /// Node currently playing, if any
    pub fn source(&self) -> Option<NodeId> {
        self.source
    }

    /// Private output gain of the current play
    pub fn gain(&self) -> Option<NodeId> {
        self.gain
    }

    /// Seconds into the buffer
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Length of the played range: `start..end`, or to the end of the buffer
    fn span(&self) -> f64 {
        (self.end.unwrap_or(self.duration) - self.start).max(0.0)
    }

    fn effective_loop(&self, sound: &SoundSettings) -> bool {
        (self.looping || sound.looping) && self.end.is_none()
    }

    /// Clone the template and start it at `offset`
    fn start_source(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, offset: f64) {
        let Some(link) = self.link else {
            return;
        };
        let graph = ctx.graph_mut();
        let Some((source, gain)) = link.clone_buffer_source(graph) else {
            tracing::warn!("Instance {} has no template to clone; media destroyed?", self.id);
            return;
        };
        self.splice = Some(Filterable::new(graph, gain, link.destination()));
        self.source = Some(source);
        self.gain = Some(gain);

        self.refresh(ctx, sound);

        let graph = ctx.graph_mut();
        let duration = graph
            .buffer_source(source)
            .and_then(|s| s.buffer.as_ref())
            .map(|b| b.duration())
            .unwrap_or(0.0);
        self.duration = duration;
        self.elapsed = offset;

        let play_for = if self.effective_loop(sound) {
            None
        } else {
            self.end.map(|end| end - offset)
        };
        graph.start(source, offset, play_for);
        self.last_update = ctx.current_time();
    }

    /// Disconnect and release the play nodes. The source's buffer is dropped
    /// before removal so the audio data is not kept alive by a dead node.
    fn release_nodes(&mut self, ctx: &mut AudioContext) {
        let graph = ctx.graph_mut();
        if let Some(source) = self.source.take() {
            graph.stop(source);
            graph.disconnect(source);
            if let Some(node) = graph.buffer_source_mut(source) {
                node.buffer = None;
            }
            graph.remove(source);
        }
        if let Some(mut splice) = self.splice.take() {
            // leaves the caller's filter nodes alive, only unlinks them
            splice.destroy(graph);
        }
        if let Some(gain) = self.gain.take() {
            graph.remove(gain);
        }
    }

    /// Re-derive progress from clock delta times the live playback rate
    fn update_progress(&mut self, ctx: &AudioContext, force: bool) {
        let Some(source) = self.source else {
            return;
        };
        let now = ctx.current_time();
        let delta = now - self.last_update;
        if delta <= 0.0 && !force {
            return;
        }
        let (rate, looping) = ctx
            .graph()
            .buffer_source(source)
            .map(|s| (s.playback_rate as f64, s.looping))
            .unwrap_or((0.0, false));
        self.elapsed += delta.max(0.0) * rate;
        self.last_update = now;

        let duration = self.duration;
        let span = self.span();
        self.progress = if duration <= 0.0 || span <= 0.0 {
            0.0
        } else if looping {
            (self.elapsed % duration) / duration
        } else {
            ((self.elapsed - self.start) / span).clamp(0.0, 1.0)
        };
        self.events.push(InstanceEvent::Progress {
            progress: self.progress,
            duration: span,
        });
    }

    fn on_complete(&mut self, ctx: &mut AudioContext) {
        self.release_nodes(ctx);
        self.active = false;
        self.progress = 1.0;
        self.events.push(InstanceEvent::Progress {
            progress: 1.0,
            duration: self.span(),
        });
        self.events.push(InstanceEvent::End);
    }
}

impl Default for WebAudioInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaInstance for WebAudioInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::WebAudio
    }

    fn init(&mut self, media: &dyn Media) {
        let media = media.as_any().downcast_ref::<WebAudioMedia>();
        assert!(
            media.is_some(),
            "A webaudio instance can only be bound to webaudio media"
        );
        self.link = media.and_then(|m| m.chain()).map(|chain| chain.link());
    }

    fn play(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, options: InstanceOptions) {
        if let Some(end) = options.end {
            assert!(end > options.start, "End time is before start time");
        }
        assert!(
            self.link.is_some(),
            "Instance {} must be initialised against a media before playing",
            self.id
        );
        if self.active {
            self.release_nodes(ctx);
        }

        let mut looping = options.looping;
        if looping && options.end.is_some() {
            tracing::warn!("Looping is not supported when specifying an end time");
            looping = false;
        }

        self.volume = options.volume;
        self.speed = options.speed;
        self.looping = looping;
        self.muted = options.muted;
        self.filters = options.filters;
        self.end = options.end;
        self.paused = false;
        self.paused_real = sound.paused || ctx.paused();
        self.active = true;
        self.progress = 0.0;

        let start = options.start.max(0.0);
        self.start = start;
        self.events.push(InstanceEvent::Start);

        if self.paused_real {
            // starts life paused; resume picks up from `start`
            self.elapsed = start;
            self.events.push(InstanceEvent::Paused);
            return;
        }

        self.start_source(ctx, sound, start);
        self.update_progress(ctx, true);
    }

    fn refresh(&mut self, ctx: &mut AudioContext, sound: &SoundSettings) {
        let (Some(source), Some(gain)) = (self.source, self.gain) else {
            return;
        };
        let looping = self.effective_loop(sound);
        let volume = mix_volume(ctx, sound, self.volume, self.muted);
        let rate = mix_speed(ctx, sound, self.speed);

        let graph = ctx.graph_mut();
        if let Some(node) = graph.buffer_source_mut(source) {
            node.looping = looping;
            node.playback_rate = rate;
        }
        graph.set_gain(gain, volume);
        if let Some(splice) = self.splice.as_mut() {
            splice.set_filters(graph, self.filters.clone());
        }
    }

    fn refresh_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings) {
        let paused_real = self.paused || sound.paused || ctx.paused();
        if paused_real == self.paused_real {
            return;
        }
        self.paused_real = paused_real;
        if !self.active {
            return;
        }

        if paused_real {
            self.update_progress(ctx, false);
            self.release_nodes(ctx);
            self.events.push(InstanceEvent::Paused);
        } else {
            self.events.push(InstanceEvent::Resumed);
            let offset = if self.duration > 0.0 {
                self.elapsed % self.duration
            } else {
                self.elapsed
            };
            self.start_source(ctx, sound, offset);
            self.update_progress(ctx, true);
        }
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, paused: bool) {
        self.paused = paused;
        self.refresh_paused(ctx, sound);
    }

    fn stop(&mut self, ctx: &mut AudioContext) {
        if !self.active {
            return;
        }
        self.release_nodes(ctx);
        self.active = false;
        self.events.push(InstanceEvent::Stop);
    }

    fn update(&mut self, ctx: &mut AudioContext, _sound: &SoundSettings) {
        self.update_progress(ctx, false);
    }

    fn on_ended(&mut self, ctx: &mut AudioContext, node: NodeId) -> bool {
        if self.source != Some(node) {
            return false;
        }
        self.update_progress(ctx, false);
        self.on_complete(ctx);
        true
    }

    fn is_playing(&self) -> bool {
        self.active
    }

    fn progress(&self) -> f64 {
        self.progress
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, volume: f32) {
        self.volume = volume;
        self.refresh(ctx, sound);
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_speed(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, speed: f32) {
        // bank progress at the old rate before the new one applies
        self.update_progress(ctx, false);
        self.speed = speed;
        self.refresh(ctx, sound);
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn set_loop(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, looping: bool) {
        if looping && self.end.is_some() {
            tracing::warn!("Looping is not supported when specifying an end time");
            return;
        }
        self.looping = looping;
        self.refresh(ctx, sound);
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, muted: bool) {
        self.muted = muted;
        self.refresh(ctx, sound);
    }

    fn filters(&self) -> Option<&[Filter]> {
        self.filters.as_deref()
    }

    fn set_filters(
        &mut self,
        ctx: &mut AudioContext,
        sound: &SoundSettings,
        filters: Option<Vec<Filter>>,
    ) {
        self.filters = filters.filter(|f| !f.is_empty());
        self.refresh(ctx, sound);
    }

    fn take_events(&mut self) -> Vec<InstanceEvent> {
        std::mem::take(&mut self.events)
    }

    fn is_reset(&self) -> bool {
        self.link.is_none()
            && self.source.is_none()
            && self.gain.is_none()
            && self.splice.is_none()
            && self.filters.is_none()
            && !self.active
            && self.events.is_empty()
    }

    fn destroy(&mut self, ctx: &mut AudioContext) {
        self.release_nodes(ctx);
        *self = Self::blank(self.id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio_system::AudioBuffer;
    use crate::filters::StereoFilter;
    use crate::media::LoadedAudio;

    const RATE: u32 = 1000;

    fn setup(seconds: f64) -> (AudioContext, WebAudioMedia) {
        let mut ctx = AudioContext::new(RATE, false, BackendKind::WebAudio);
        let mut media = WebAudioMedia::new(&mut ctx);
        let buffer = Arc::new(AudioBuffer::new(1, (seconds * RATE as f64) as usize, RATE));
        media.attach(&mut ctx, LoadedAudio { bytes: None, buffer });
        (ctx, media)
    }

    fn started(ctx: &mut AudioContext, media: &WebAudioMedia, options: InstanceOptions) -> WebAudioInstance {
        let mut instance = WebAudioInstance::new();
        instance.init(media);
        instance.play(ctx, &SoundSettings::default(), options);
        instance
    }

    fn run(ctx: &mut AudioContext, instance: &mut WebAudioInstance, dt: f64) -> bool {
        let ended = ctx.advance(dt);
        let mut hit = false;
        for node in ended {
            hit |= instance.on_ended(ctx, node);
        }
        instance.update(ctx, &SoundSettings::default());
        hit
    }

    #[test]
    fn test_play_wires_clone_into_media_chain() {
        let (mut ctx, media) = setup(0.5);
        let instance = started(&mut ctx, &media, InstanceOptions::default());
        let source = instance.source().unwrap();
        let chain = media.chain().unwrap();
        let route = ctx.graph().route(source);
        assert_eq!(route[1], instance.gain().unwrap());
        assert_eq!(route[2], chain.analyser());
        assert!(instance.is_playing());
    }

    #[test]
    fn test_start_then_natural_end() {
        let (mut ctx, media) = setup(0.1);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        let events = instance.take_events();
        assert_eq!(events[0], InstanceEvent::Start);

        assert!(run(&mut ctx, &mut instance, 0.2));
        let events = instance.take_events();
        assert_eq!(events.last(), Some(&InstanceEvent::End));
        assert!(events.contains(&InstanceEvent::Progress {
            progress: 1.0,
            duration: 0.1
        }));
        assert!(!instance.is_playing());
        assert!(instance.source().is_none());
    }

    #[test]
    fn test_end_time_limits_playback_and_disables_loop() {
        let (mut ctx, media) = setup(1.0);
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                start: 0.2,
                end: Some(0.4),
                looping: true,
                ..Default::default()
            },
        );
        assert!(!instance.looping());
        assert!(!run(&mut ctx, &mut instance, 0.1));
        assert!(run(&mut ctx, &mut instance, 0.15));
    }

    #[test]
    fn test_progress_covers_played_range() {
        let (mut ctx, media) = setup(1.0);
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                start: 0.2,
                end: Some(0.6),
                ..Default::default()
            },
        );
        run(&mut ctx, &mut instance, 0.2);
        assert!((instance.progress() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_loop_refused_on_bounded_play() {
        let (mut ctx, media) = setup(1.0);
        let sound = SoundSettings::default();
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                end: Some(0.5),
                ..Default::default()
            },
        );
        instance.set_loop(&mut ctx, &sound, true);
        assert!(!instance.looping());
        let source = instance.source().unwrap();
        assert!(!ctx.graph().buffer_source(source).unwrap().looping);
        assert!(run(&mut ctx, &mut instance, 0.6));
    }

    #[test]
    #[should_panic(expected = "End time is before start time")]
    fn test_end_before_start_panics() {
        let (mut ctx, media) = setup(1.0);
        started(
            &mut ctx,
            &media,
            InstanceOptions {
                start: 0.5,
                end: Some(0.2),
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_looping_never_ends() {
        let (mut ctx, media) = setup(0.1);
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                looping: true,
                ..Default::default()
            },
        );
        for _ in 0..10 {
            assert!(!run(&mut ctx, &mut instance, 0.05));
        }
        assert!(instance.is_playing());
        assert!(instance.progress() < 1.0);
    }

    #[test]
    fn test_stop_queues_stop_and_releases_nodes() {
        let (mut ctx, media) = setup(0.5);
        let baseline = ctx.graph().node_count();
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        instance.take_events();
        instance.stop(&mut ctx);
        assert_eq!(instance.take_events(), vec![InstanceEvent::Stop]);
        assert_eq!(ctx.graph().node_count(), baseline);

        instance.stop(&mut ctx);
        assert!(instance.take_events().is_empty());
    }

    #[test]
    fn test_volume_multiplies_all_levels() {
        let (mut ctx, media) = setup(0.5);
        ctx.set_volume(0.5);
        let sound = SoundSettings {
            volume: 0.5,
            ..Default::default()
        };
        let mut instance = WebAudioInstance::new();
        instance.init(&media);
        instance.play(
            &mut ctx,
            &sound,
            InstanceOptions {
                volume: 0.5,
                ..Default::default()
            },
        );
        let gain = instance.gain().unwrap();
        assert!((ctx.graph().gain_value(gain).unwrap() - 0.125).abs() < 1e-6);

        ctx.set_muted(true);
        instance.refresh(&mut ctx, &sound);
        assert_eq!(ctx.graph().gain_value(gain), Some(0.0));
    }

    #[test]
    fn test_pause_and_resume_keep_position() {
        let (mut ctx, media) = setup(1.0);
        let sound = SoundSettings::default();
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        run(&mut ctx, &mut instance, 0.25);
        instance.take_events();

        instance.set_paused(&mut ctx, &sound, true);
        assert!(instance.source().is_none());
        assert!(instance.take_events().contains(&InstanceEvent::Paused));
        run(&mut ctx, &mut instance, 0.5);
        assert!((instance.elapsed() - 0.25).abs() < 1e-9);

        instance.set_paused(&mut ctx, &sound, false);
        assert_eq!(instance.take_events()[0], InstanceEvent::Resumed);
        let position = ctx
            .graph()
            .buffer_source(instance.source().unwrap())
            .and_then(|s| s.position())
            .unwrap();
        assert!((position - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_play_while_paused_starts_in_paused_state() {
        let (mut ctx, media) = setup(0.5);
        ctx.set_paused(true);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        assert_eq!(
            instance.take_events(),
            vec![InstanceEvent::Start, InstanceEvent::Paused]
        );
        assert!(instance.source().is_none());

        ctx.set_paused(false);
        instance.refresh_paused(&mut ctx, &SoundSettings::default());
        assert!(instance.source().is_some());
    }

    #[test]
    fn test_instance_filters_splice_between_gain_and_media() {
        let (mut ctx, media) = setup(0.5);
        let stereo = StereoFilter::new(ctx.graph_mut(), -1.0).filter();
        let instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                filters: Some(vec![stereo.clone()]),
                ..Default::default()
            },
        );
        let gain = instance.gain().unwrap();
        assert!(ctx.graph().is_connected(gain, stereo.destination().unwrap()));
        assert!(!ctx.graph().is_connected(gain, media.chain().unwrap().analyser()));
    }

    #[test]
    fn test_destroy_resets_for_pooling() {
        let (mut ctx, media) = setup(0.5);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        let id = instance.id();
        instance.destroy(&mut ctx);
        assert!(instance.is_reset());
        assert_eq!(instance.id(), id);
    }
}
