/// Sound construction options and per-play options
///
/// [`SoundOptions`] describe a sound (source, defaults, sprites) and are the
/// manifest format used by the config file. [`PlaySource`] is everything
/// `play` accepts; it is normalised into one [`InstanceOptions`] value.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};

use crate::audio_system::AudioBuffer;
use crate::error::{SoundError, SoundResult};
use crate::filters::Filter;
use crate::media::{InstanceId, InstanceOptions};

use super::loader::SoundSource;
use super::sprite::{SoundSprite, SoundSpriteData};
use super::Sound;

/// Called once with the owning sound when a play ends naturally
pub type CompleteCallback = Box<dyn FnOnce(&Sound)>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundOptions {
    /// File path; may use `name.{ogg,mp3}` to pick the first supported format
    pub url: Option<String>,

    /// Compressed bytes, decoded on load
    #[serde(skip)]
    pub bytes: Option<Arc<Vec<u8>>>,

    /// Extension hint for `bytes`
    #[serde(skip)]
    pub extension: Option<String>,

    /// Already decoded audio; the sound is loaded immediately
    #[serde(skip)]
    pub buffer: Option<Arc<AudioBuffer>>,

    /// Start loading as soon as the sound is added
    pub preload: bool,

    /// Play once loaded (implies `preload`)
    pub autoplay: bool,

    /// Stop other instances of this sound whenever a new one starts
    pub single_instance: bool,

    pub volume: f32,
    pub speed: f32,
    pub muted: bool,

    #[serde(rename = "loop")]
    pub looping: bool,

    pub sprites: HashMap<String, SoundSpriteData>,

    #[serde(skip)]
    pub filters: Option<Vec<Filter>>,
}

impl Default for SoundOptions {
    fn default() -> Self {
        Self {
            url: None,
            bytes: None,
            extension: None,
            buffer: None,
            preload: false,
            autoplay: false,
            single_instance: false,
            volume: 1.0,
            speed: 1.0,
            muted: false,
            looping: false,
            sprites: HashMap::new(),
            filters: None,
        }
    }
}

impl SoundOptions {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(Arc::new(bytes)),
            ..Default::default()
        }
    }

    pub fn from_buffer(buffer: AudioBuffer) -> Self {
        Self {
            buffer: Some(Arc::new(buffer)),
            ..Default::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_single_instance(mut self, single_instance: bool) -> Self {
        self.single_instance = single_instance;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_sprite(mut self, alias: impl Into<String>, data: SoundSpriteData) -> Self {
        self.sprites.insert(alias.into(), data);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Where audio comes from, most decoded form first
    pub fn source(&self) -> Option<SoundSource> {
        if let Some(buffer) = &self.buffer {
            return Some(SoundSource::Buffer(buffer.clone()));
        }
        if let Some(bytes) = &self.bytes {
            return Some(SoundSource::Bytes {
                bytes: bytes.clone(),
                extension: self.extension.clone(),
            });
        }
        self.url.clone().map(SoundSource::Url)
    }
}

impl From<&str> for SoundOptions {
    fn from(url: &str) -> Self {
        Self::from_url(url)
    }
}

impl From<String> for SoundOptions {
    fn from(url: String) -> Self {
        Self::from_url(url)
    }
}

impl From<Vec<u8>> for SoundOptions {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<AudioBuffer> for SoundOptions {
    fn from(buffer: AudioBuffer) -> Self {
        Self::from_buffer(buffer)
    }
}

/// Options for one play. Unset fields fall back to the sprite (if any) and
/// then to the defaults `start = 0, volume = 1, speed = 1, loop = false`.
#[derive(Default)]
pub struct PlayOptions {
    pub start: f64,
    pub end: Option<f64>,
    pub speed: Option<f32>,
    pub looping: Option<bool>,
    pub volume: Option<f32>,
    pub muted: bool,
    pub filters: Option<Vec<Filter>>,
    pub single_instance: bool,
    pub sprite: Option<String>,
    pub complete: Option<CompleteCallback>,
}

impl PlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_single_instance(mut self, single_instance: bool) -> Self {
        self.single_instance = single_instance;
        self
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = Some(sprite.into());
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Sound) + 'static,
    {
        self.complete = Some(Box::new(callback));
        self
    }

    /// Resolve against an optional sprite into the options an instance plays with.
    ///
    /// With a sprite, `start` becomes an offset into the sprite's range and the
    /// sprite's end always applies. An explicit play speed wins over the
    /// sprite's speed; the sprite's speed only fills in when none was given.
    pub(crate) fn resolve(
        self,
        sprite: Option<&SoundSprite>,
    ) -> (InstanceOptions, bool, Option<CompleteCallback>) {
        let mut options = InstanceOptions {
            start: self.start,
            end: self.end,
            speed: self.speed.unwrap_or(1.0),
            looping: self.looping.unwrap_or(false),
            volume: self.volume.unwrap_or(1.0),
            muted: self.muted,
            filters: self.filters,
        };
        if let Some(sprite) = sprite {
            options.start = sprite.start() + self.start;
            options.end = Some(sprite.end());
            options.speed = self.speed.or(sprite.speed()).unwrap_or(1.0);
            options.looping = self.looping.unwrap_or(false) || sprite.looping();
        }
        options.start = options.start.max(0.0);
        (options, self.single_instance, self.complete)
    }
}

impl fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayOptions")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("speed", &self.speed)
            .field("looping", &self.looping)
            .field("volume", &self.volume)
            .field("muted", &self.muted)
            .field("single_instance", &self.single_instance)
            .field("sprite", &self.sprite)
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

/// What `play` accepts
pub enum PlaySource {
    /// Whole sound with default options
    Default,
    /// A sprite alias
    Sprite(String),
    /// Default options plus a completion callback
    Complete(CompleteCallback),
    Options(PlayOptions),
}

impl PlaySource {
    pub fn complete<F>(callback: F) -> Self
    where
        F: FnOnce(&Sound) + 'static,
    {
        Self::Complete(Box::new(callback))
    }

    /// Normalise into play options
    pub fn into_options(self) -> PlayOptions {
        match self {
            Self::Default => PlayOptions::default(),
            Self::Sprite(alias) => PlayOptions::default().with_sprite(alias),
            Self::Complete(callback) => PlayOptions {
                complete: Some(callback),
                ..Default::default()
            },
            Self::Options(options) => options,
        }
    }
}

impl Default for PlaySource {
    fn default() -> Self {
        Self::Default
    }
}

impl fmt::Debug for PlaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Sprite(alias) => f.debug_tuple("Sprite").field(alias).finish(),
            Self::Complete(_) => write!(f, "Complete(..)"),
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
        }
    }
}

impl From<()> for PlaySource {
    fn from(_: ()) -> Self {
        Self::Default
    }
}

impl From<&str> for PlaySource {
    fn from(alias: &str) -> Self {
        Self::Sprite(alias.to_string())
    }
}

impl From<String> for PlaySource {
    fn from(alias: String) -> Self {
        Self::Sprite(alias)
    }
}

impl From<PlayOptions> for PlaySource {
    fn from(options: PlayOptions) -> Self {
        Self::Options(options)
    }
}

/// Result of `play`: an instance right away, or a promise for one when the
/// sound still has to load
#[derive(Debug)]
pub enum Playback {
    Started(InstanceId),
    Pending(PendingPlay),
}

impl Playback {
    /// The instance, if it started synchronously
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::Started(id) => Some(*id),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn into_pending(self) -> Option<PendingPlay> {
        match self {
            Self::Started(_) => None,
            Self::Pending(pending) => Some(pending),
        }
    }
}

/// Promise of an instance, settled when the sound's load finishes
#[derive(Debug)]
pub struct PendingPlay {
    receiver: Receiver<SoundResult<InstanceId>>,
}

impl PendingPlay {
    pub(crate) fn new(receiver: Receiver<SoundResult<InstanceId>>) -> Self {
        Self { receiver }
    }

    /// `None` while the load is still in flight
    pub fn try_resolve(&self) -> Option<SoundResult<InstanceId>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SoundError::Canceled)),
        }
    }

    /// Block until settled. Only useful when another thread drives the
    /// library; single-threaded callers use `SoundLibrary::resolve`.
    pub fn wait(&self, timeout: Duration) -> Option<SoundResult<InstanceId>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(SoundError::Canceled)),
        }
    }
}
