/// Element play instance
///
/// A media element has a single playhead; here it is a position in seconds
/// advanced by context clock deltas times the effective rate. The element
/// decides on its own when it has reached `end`, so completion is detected in
/// [`MediaInstance::update`] rather than reported by the graph.
use std::any::Any;
use std::sync::Arc;

use crate::audio_system::{AudioContext, NodeId};
use crate::filters::Filter;
use crate::media::{
    mix_speed, mix_volume, BackendKind, InstanceEvent, InstanceId, InstanceOptions, Media,
    MediaInstance, SoundSettings,
};

#[cfg(feature = "rodio-output")]
use super::output::ElementOutput;
use super::media::ElementMedia;

#[derive(Debug)]
pub struct ElementInstance {
    id: InstanceId,
    bytes: Option<Arc<Vec<u8>>>,
    media_duration: f64,
    start: f64,
    end: f64,
    position: f64,
    last_update: f64,
    rate: f64,
    output_volume: f32,
    volume: f32,
    speed: f32,
    looping: bool,
    sound_looping: bool,
    bounded: bool,
    muted: bool,
    paused: bool,
    paused_real: bool,
    active: bool,
    bound: bool,
    progress: f64,
    events: Vec<InstanceEvent>,
    #[cfg(feature = "rodio-output")]
    output: Option<ElementOutput>,
}

impl ElementInstance {
    pub fn new() -> Self {
        Self::blank(InstanceId::next())
    }

    fn blank(id: InstanceId) -> Self {
        Self {
            id,
            bytes: None,
            media_duration: 0.0,
            start: 0.0,
            end: 0.0,
            position: 0.0,
            last_update: 0.0,
            rate: 1.0,
            output_volume: 1.0,
            volume: 1.0,
            speed: 1.0,
            looping: false,
            sound_looping: false,
            bounded: false,
            muted: false,
            paused: false,
            paused_real: false,
            active: false,
            bound: false,
            progress: 0.0,
            events: Vec::new(),
            #[cfg(feature = "rodio-output")]
            output: None,
        }
    }

    /// Playhead in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Volume the element is currently set to after mixing
    pub fn output_volume(&self) -> f32 {
        self.output_volume
    }

    fn effective_loop(&self) -> bool {
        self.looping || self.sound_looping
    }

    /// Bank elapsed clock time into the playhead. Returns true once the
    /// playhead has passed `end` on a non-looping play.
    fn advance_playhead(&mut self, ctx: &AudioContext) -> bool {
        let now = ctx.current_time();
        let delta = (now - self.last_update).max(0.0);
        self.last_update = now;
        if self.paused_real {
            return false;
        }
        self.position += delta * self.rate;

        if self.effective_loop() && self.media_duration > 0.0 {
            if self.position >= self.media_duration {
                self.position %= self.media_duration;
            }
            self.progress = self.position / self.media_duration;
            return false;
        }

        let span = self.end - self.start;
        self.progress = if span > 0.0 {
            ((self.position - self.start) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.position >= self.end
    }

    fn complete(&mut self) {
        self.close_output();
        self.active = false;
        self.progress = 1.0;
        self.events.push(InstanceEvent::Progress {
            progress: 1.0,
            duration: self.end - self.start,
        });
        self.events.push(InstanceEvent::End);
    }

    #[cfg(feature = "rodio-output")]
    fn open_output(&mut self) {
        let Some(bytes) = self.bytes.as_ref() else {
            return;
        };
        let end = (!self.effective_loop()).then_some(self.end);
        match ElementOutput::open(bytes, self.position, end, self.effective_loop()) {
            Ok(output) => {
                output.set_volume(self.output_volume);
                output.set_speed(self.rate as f32);
                self.output = Some(output);
            }
            Err(err) => {
                tracing::warn!("No audio output for instance {}: {}", self.id, err);
            }
        }
    }

    #[cfg(not(feature = "rodio-output"))]
    fn open_output(&mut self) {}

    #[cfg(feature = "rodio-output")]
    fn close_output(&mut self) {
        if let Some(output) = self.output.take() {
            output.stop();
        }
    }

    #[cfg(not(feature = "rodio-output"))]
    fn close_output(&mut self) {}

    #[cfg(feature = "rodio-output")]
    fn apply_output(&self) {
        if let Some(output) = self.output.as_ref() {
            output.set_volume(self.output_volume);
            output.set_speed(self.rate as f32);
        }
    }

    #[cfg(not(feature = "rodio-output"))]
    fn apply_output(&self) {}
}

impl Default for ElementInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaInstance for ElementInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Element
    }

    fn init(&mut self, media: &dyn Media) {
        let media = media.as_any().downcast_ref::<ElementMedia>();
        assert!(
            media.is_some(),
            "An element instance can only be bound to element media"
        );
        if let Some(media) = media {
            self.bytes = media.bytes().cloned();
            self.media_duration = media.duration();
            self.bound = true;
        }
    }

    fn play(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, options: InstanceOptions) {
        if let Some(end) = options.end {
            assert!(end > options.start, "End time is before start time");
        }
        assert!(
            self.bound,
            "Instance {} must be initialised against a media before playing",
            self.id
        );
        if options.filters.as_ref().map_or(false, |f| !f.is_empty()) {
            tracing::warn!("Filters are not supported with the element backend");
        }
        self.close_output();

        let mut looping = options.looping;
        if looping && options.end.is_some() {
            tracing::warn!("Looping is not supported when specifying an end time");
            looping = false;
        }

        self.start = options.start.max(0.0);
        self.bounded = options.end.is_some();
        self.end = options.end.unwrap_or(self.media_duration).min(self.media_duration);
        self.position = self.start;
        self.volume = options.volume;
        self.speed = options.speed;
        self.looping = looping;
        self.muted = options.muted;
        self.paused = false;
        self.paused_real = sound.paused || ctx.paused();
        self.active = true;
        self.progress = 0.0;
        self.last_update = ctx.current_time();
        self.refresh(ctx, sound);

        self.events.push(InstanceEvent::Start);
        if self.paused_real {
            self.events.push(InstanceEvent::Paused);
            return;
        }
        self.open_output();
        self.events.push(InstanceEvent::Progress {
            progress: 0.0,
            duration: self.end - self.start,
        });
    }

    fn refresh(&mut self, ctx: &mut AudioContext, sound: &SoundSettings) {
        self.output_volume = mix_volume(ctx, sound, self.volume, self.muted);
        self.rate = mix_speed(ctx, sound, self.speed) as f64;
        // an explicit end always wins over the sound's loop flag
        self.sound_looping = sound.looping && !self.bounded;
        self.apply_output();
    }

    fn refresh_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings) {
        let paused_real = self.paused || sound.paused || ctx.paused();
        if paused_real == self.paused_real {
            return;
        }
        if self.active {
            self.advance_playhead(ctx);
        }
        self.paused_real = paused_real;
        self.last_update = ctx.current_time();
        if !self.active {
            return;
        }

        if paused_real {
            #[cfg(feature = "rodio-output")]
            if let Some(output) = self.output.as_ref() {
                output.pause();
            }
            self.events.push(InstanceEvent::Paused);
        } else {
            self.events.push(InstanceEvent::Resumed);
            #[cfg(feature = "rodio-output")]
            match self.output.as_ref() {
                Some(output) => output.resume(),
                None => self.open_output(),
            };
        }
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, paused: bool) {
        self.paused = paused;
        self.refresh_paused(ctx, sound);
    }

    fn stop(&mut self, _ctx: &mut AudioContext) {
        if !self.active {
            return;
        }
        self.close_output();
        self.active = false;
        self.events.push(InstanceEvent::Stop);
    }

    fn update(&mut self, ctx: &mut AudioContext, _sound: &SoundSettings) {
        if !self.active {
            return;
        }
        let ended = self.advance_playhead(ctx);
        if ended {
            self.complete();
        } else if !self.paused_real {
            self.events.push(InstanceEvent::Progress {
                progress: self.progress,
                duration: self.end - self.start,
            });
        }
    }

    fn on_ended(&mut self, _ctx: &mut AudioContext, _node: NodeId) -> bool {
        false
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
        if self.active {
            self.advance_playhead(ctx);
        }
        self.speed = speed;
        self.refresh(ctx, sound);
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn set_loop(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, looping: bool) {
        if looping && self.bounded {
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
        None
    }

    fn set_filters(
        &mut self,
        _ctx: &mut AudioContext,
        _sound: &SoundSettings,
        filters: Option<Vec<Filter>>,
    ) {
        if filters.map_or(false, |f| !f.is_empty()) {
            tracing::warn!("Filters are not supported with the element backend");
        }
    }

    fn take_events(&mut self) -> Vec<InstanceEvent> {
        std::mem::take(&mut self.events)
    }

    fn is_reset(&self) -> bool {
        !self.bound && self.bytes.is_none() && !self.active && self.events.is_empty()
    }

    fn destroy(&mut self, _ctx: &mut AudioContext) {
        self.close_output();
        *self = Self::blank(self.id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::AudioBuffer;
    use crate::media::LoadedAudio;

    fn setup(seconds: f64) -> (AudioContext, ElementMedia) {
        let mut ctx = AudioContext::new(1000, false, BackendKind::Element);
        let mut media = ElementMedia::new();
        media.attach(
            &mut ctx,
            LoadedAudio {
                bytes: None,
                buffer: Arc::new(AudioBuffer::new(1, (seconds * 1000.0) as usize, 1000)),
            },
        );
        (ctx, media)
    }

    fn started(ctx: &mut AudioContext, media: &ElementMedia, options: InstanceOptions) -> ElementInstance {
        let mut instance = ElementInstance::new();
        instance.init(media);
        instance.play(ctx, &SoundSettings::default(), options);
        instance
    }

    fn tick(ctx: &mut AudioContext, instance: &mut ElementInstance, dt: f64) {
        ctx.advance(dt);
        instance.update(ctx, &SoundSettings::default());
    }

    #[test]
    fn test_plays_to_end() {
        let (mut ctx, media) = setup(0.1);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        assert_eq!(instance.take_events()[0], InstanceEvent::Start);
        tick(&mut ctx, &mut instance, 0.05);
        assert!(instance.is_playing());
        tick(&mut ctx, &mut instance, 0.06);
        let events = instance.take_events();
        assert_eq!(events.last(), Some(&InstanceEvent::End));
        assert!(!instance.is_playing());
        assert_eq!(instance.progress(), 1.0);
    }

    #[test]
    fn test_speed_scales_playhead() {
        let (mut ctx, media) = setup(1.0);
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                speed: 2.0,
                ..Default::default()
            },
        );
        tick(&mut ctx, &mut instance, 0.25);
        assert!((instance.position() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_loop_with_end_is_refused() {
        let (mut ctx, media) = setup(1.0);
        let instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                end: Some(0.5),
                looping: true,
                ..Default::default()
            },
        );
        assert!(!instance.looping());
    }

    #[test]
    fn test_looping_wraps_whole_media() {
        let (mut ctx, media) = setup(0.5);
        let mut instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                looping: true,
                ..Default::default()
            },
        );
        tick(&mut ctx, &mut instance, 0.75);
        assert!(instance.is_playing());
        assert!((instance.position() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_paused_playhead_holds() {
        let (mut ctx, media) = setup(1.0);
        let sound = SoundSettings::default();
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        tick(&mut ctx, &mut instance, 0.25);
        instance.set_paused(&mut ctx, &sound, true);
        tick(&mut ctx, &mut instance, 0.25);
        assert!((instance.position() - 0.25).abs() < 1e-9);
        instance.set_paused(&mut ctx, &sound, false);
        tick(&mut ctx, &mut instance, 0.25);
        assert!((instance.position() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_volume_mix() {
        let (mut ctx, media) = setup(1.0);
        ctx.set_volume(0.5);
        let instance = started(
            &mut ctx,
            &media,
            InstanceOptions {
                volume: 0.5,
                ..Default::default()
            },
        );
        assert!((instance.output_volume() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_destroy_resets() {
        let (mut ctx, media) = setup(1.0);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        instance.destroy(&mut ctx);
        assert!(instance.is_reset());
    }

    #[test]
    fn test_ended_nodes_are_not_claimed() {
        let (mut ctx, media) = setup(1.0);
        let mut instance = started(&mut ctx, &media, InstanceOptions::default());
        let node = ctx.graph_mut().create(crate::audio_system::AudioNode::gain(1.0));
        assert!(!instance.on_ended(&mut ctx, node));
    }
}
