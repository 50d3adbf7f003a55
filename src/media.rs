/// Media backends
///
/// A [`Media`] owns a sound's audio data and stamps out [`MediaInstance`]s, one
/// per play. Two implementations exist: the graph-backed `webaudio` backend and
/// the `element` backend that models a plain media element.
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio_system::{AudioBuffer, AudioContext, NodeId};
use crate::element::ElementMedia;
use crate::filters::Filter;
use crate::webaudio::WebAudioMedia;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

/// Which backend a media or instance belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    WebAudio,
    Element,
}

/// Identifier of one instance object. Pooled instances keep their id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle notifications queued by an instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceEvent {
    Start,
    Progress { progress: f64, duration: f64 },
    Paused,
    Resumed,
    End,
    Stop,
}

/// Sound-level settings every instance multiplies with its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundSettings {
    pub volume: f32,
    pub muted: bool,
    pub speed: f32,
    pub looping: bool,
    pub paused: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            speed: 1.0,
            looping: false,
            paused: false,
        }
    }
}

/// Fully resolved options for one instance play
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOptions {
    pub start: f64,
    pub end: Option<f64>,
    pub speed: f32,
    pub looping: bool,
    pub volume: f32,
    pub muted: bool,
    pub filters: Option<Vec<Filter>>,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: None,
            speed: 1.0,
            looping: false,
            volume: 1.0,
            muted: false,
            filters: None,
        }
    }
}

/// Output gain: each level contributes `volume * (muted ? 0 : 1)`
pub fn mix_volume(ctx: &AudioContext, sound: &SoundSettings, volume: f32, muted: bool) -> f32 {
    let instance = if muted { 0.0 } else { volume };
    let sound = if sound.muted { 0.0 } else { sound.volume };
    instance * sound * ctx.effective_volume()
}

/// Playback rate: product of instance, sound and context speed
pub fn mix_speed(ctx: &AudioContext, sound: &SoundSettings, speed: f32) -> f32 {
    speed * sound.speed * ctx.speed()
}

/// Audio handed to a media once loading has finished
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub bytes: Option<Arc<Vec<u8>>>,
    pub buffer: Arc<AudioBuffer>,
}

/// Owner of a sound's audio data
pub trait Media: fmt::Debug {
    fn kind(&self) -> BackendKind;

    fn is_playable(&self) -> bool;

    /// Length of the loaded audio in seconds, 0 when not loaded
    fn duration(&self) -> f64;

    fn filters(&self) -> Option<&[Filter]>;

    fn set_filters(&mut self, ctx: &mut AudioContext, filters: Option<Vec<Filter>>);

    /// Accept loaded audio
    fn attach(&mut self, ctx: &mut AudioContext, audio: LoadedAudio);

    /// Allocate a fresh, uninitialised instance for this backend
    fn create(&self) -> Box<dyn MediaInstance>;

    fn destroy(&mut self, ctx: &mut AudioContext);

    fn as_any(&self) -> &dyn Any;
}

/// One rendition of a sound
pub trait MediaInstance: fmt::Debug {
    fn id(&self) -> InstanceId;

    fn kind(&self) -> BackendKind;

    /// Bind to a media before playing
    fn init(&mut self, media: &dyn Media);

    /// Start playing. `options.end`, if set, must be after `options.start`.
    fn play(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, options: InstanceOptions);

    /// Recompute output gain, rate, loop and filters from all three levels
    fn refresh(&mut self, ctx: &mut AudioContext, sound: &SoundSettings);

    /// Re-evaluate `instance || sound || context` pause
    fn refresh_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings);

    fn paused(&self) -> bool;

    fn set_paused(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, paused: bool);

    /// Stop immediately, queueing [`InstanceEvent::Stop`] if it was playing
    fn stop(&mut self, ctx: &mut AudioContext);

    /// Per-tick progress poll
    fn update(&mut self, ctx: &mut AudioContext, sound: &SoundSettings);

    /// Platform reports `node` ended. Returns true if it belonged to this instance.
    fn on_ended(&mut self, ctx: &mut AudioContext, node: NodeId) -> bool;

    /// Between `play` and its end/stop (a paused instance counts)
    fn is_playing(&self) -> bool;

    fn progress(&self) -> f64;

    fn volume(&self) -> f32;

    fn set_volume(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, volume: f32);

    fn speed(&self) -> f32;

    fn set_speed(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, speed: f32);

    fn looping(&self) -> bool;

    fn set_loop(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, looping: bool);

    fn muted(&self) -> bool;

    fn set_muted(&mut self, ctx: &mut AudioContext, sound: &SoundSettings, muted: bool);

    fn filters(&self) -> Option<&[Filter]>;

    fn set_filters(
        &mut self,
        ctx: &mut AudioContext,
        sound: &SoundSettings,
        filters: Option<Vec<Filter>>,
    );

    /// Drain queued lifecycle events
    fn take_events(&mut self) -> Vec<InstanceEvent>;

    /// True when no per-play state is left (safe to pool)
    fn is_reset(&self) -> bool;

    /// Stop silently, release nodes and reset every per-play field
    fn destroy(&mut self, ctx: &mut AudioContext);

    fn as_any(&self) -> &dyn Any;
}

/// Create the media matching the context's backend
pub fn create_media(ctx: &mut AudioContext) -> Box<dyn Media> {
    match ctx.backend() {
        BackendKind::WebAudio => Box::new(WebAudioMedia::new(ctx)),
        BackendKind::Element => Box::new(ElementMedia::new()),
    }
}
