/// Sound library
///
/// Registry of sounds by alias and owner of everything they share: the audio
/// context, the instance pool, the event bus and the load channel. Global
/// changes made through the library are broadcast to every sound right away;
/// changes made directly on [`SoundLibrary::context_mut`] are broadcast on the
/// next [`SoundLibrary::sync`] or [`SoundLibrary::update`].
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::audio_system::{AudioContext, ContextState};
use crate::config::LibraryConfig;
use crate::error::SoundResult;
use crate::filters::Filter;
use crate::media::{BackendKind, InstanceId, MediaInstance};
use crate::messaging::{EventBus, SoundEvent};
use crate::sound::{
    InstancePool, LoadOutcome, PendingPlay, PlaySource, Playback, Sound, SoundOptions,
};

pub struct SoundLibrary {
    ctx: AudioContext,
    sounds: HashMap<String, Sound>,
    pool: InstancePool,
    events: EventBus,
    loads: Sender<LoadOutcome>,
    outcomes: Receiver<LoadOutcome>,
    transient: HashSet<String>,
    next_transient: u64,
    sample_rate: u32,
    require_gesture: bool,
}

impl std::fmt::Debug for SoundLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundLibrary")
            .field("sounds", &self.sounds.len())
            .field("pooled", &self.pool.len())
            .field("backend", &self.ctx.backend())
            .field("state", &self.ctx.state())
            .finish()
    }
}

impl SoundLibrary {
    /// Create a library with the config's global settings. Sounds listed in
    /// the config are not added; see [`SoundLibrary::from_config`].
    pub fn new(config: &LibraryConfig) -> Self {
        let backend = if config.use_legacy {
            BackendKind::Element
        } else {
            BackendKind::WebAudio
        };
        let mut ctx = AudioContext::new(config.sample_rate, config.require_gesture, backend);
        ctx.set_volume(config.volume);
        ctx.set_speed(config.speed);
        ctx.set_muted(config.muted);
        ctx.take_refresh();

        let (loads, outcomes) = crossbeam_channel::unbounded();
        tracing::info!("Sound library ready ({:?} backend)", backend);
        Self {
            ctx,
            sounds: HashMap::new(),
            pool: InstancePool::new(),
            events: EventBus::new(),
            loads,
            outcomes,
            transient: HashSet::new(),
            next_transient: 0,
            sample_rate: config.sample_rate,
            require_gesture: config.require_gesture,
        }
    }

    /// Create a library and add every sound in the config's manifest
    pub fn from_config(config: &LibraryConfig) -> Self {
        let mut library = Self::new(config);
        for (alias, options) in &config.sounds {
            library.add(alias.clone(), options.clone());
        }
        library
    }

    /// Reallocate the audio context after [`SoundLibrary::close`]
    pub fn init(&mut self) {
        if self.ctx.state() != ContextState::Closed {
            return;
        }
        let mut ctx = AudioContext::new(self.sample_rate, self.require_gesture, self.ctx.backend());
        ctx.set_volume(self.ctx.volume());
        ctx.set_speed(self.ctx.speed());
        ctx.set_muted(self.ctx.muted());
        ctx.take_refresh();
        self.ctx = ctx;
        tracing::info!("Sound library reinitialised");
    }

    /// Stop and remove every sound, then close the audio context
    pub fn close(&mut self) {
        self.remove_all();
        self.pool.clear();
        self.ctx.close();
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn context(&self) -> &AudioContext {
        &self.ctx
    }

    /// Direct access to the context; call [`SoundLibrary::sync`] after
    /// changing its settings
    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.ctx
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn use_legacy(&self) -> bool {
        self.ctx.backend() == BackendKind::Element
    }

    /// Switch the backend used for sounds added from now on
    pub fn set_use_legacy(&mut self, legacy: bool) {
        let backend = if legacy {
            BackendKind::Element
        } else {
            BackendKind::WebAudio
        };
        if backend == self.ctx.backend() {
            return;
        }
        self.ctx.set_backend(backend);
        self.pool.clear();
        tracing::info!("Switched to the {:?} backend", backend);
    }

    /// Register a sound. Panics if `alias` is taken.
    pub fn add(&mut self, alias: impl Into<String>, options: impl Into<SoundOptions>) -> &mut Sound {
        let alias = alias.into();
        assert!(
            !self.sounds.contains_key(&alias),
            "Sound with alias {} already exists.",
            alias
        );
        let mut sound = Sound::new(alias.clone(), options.into(), &mut self.ctx, self.events.clone());
        sound.activate(&mut self.ctx, &mut self.pool, &self.loads);
        self.sounds.entry(alias).or_insert(sound)
    }

    /// Register several sounds at once
    pub fn add_map(&mut self, sounds: HashMap<String, SoundOptions>) -> Vec<String> {
        let mut aliases = Vec::with_capacity(sounds.len());
        for (alias, options) in sounds {
            self.add(alias.clone(), options);
            aliases.push(alias);
        }
        aliases
    }

    /// Register several urls sharing the same options
    pub fn add_urls(&mut self, urls: HashMap<String, String>, defaults: &SoundOptions) -> Vec<String> {
        let sounds = urls
            .into_iter()
            .map(|(alias, url)| {
                let mut options = defaults.clone();
                options.url = Some(url);
                options.bytes = None;
                options.buffer = None;
                (alias, options)
            })
            .collect();
        self.add_map(sounds)
    }

    /// Panics if `alias` is not registered
    pub fn remove(&mut self, alias: &str) {
        self.exists(alias, true);
        if let Some(mut sound) = self.sounds.remove(alias) {
            sound.destroy(&mut self.ctx, &mut self.pool);
        }
        self.transient.remove(alias);
    }

    pub fn remove_all(&mut self) {
        for (_, mut sound) in self.sounds.drain() {
            sound.destroy(&mut self.ctx, &mut self.pool);
        }
        self.transient.clear();
    }

    /// Whether `alias` is registered; panics instead of returning false when
    /// `assert_missing` is set
    pub fn exists(&self, alias: &str, assert_missing: bool) -> bool {
        let exists = self.sounds.contains_key(alias);
        if assert_missing {
            assert!(exists, "No sound matching alias '{}'.", alias);
        }
        exists
    }

    /// Panics if `alias` is not registered
    pub fn find(&self, alias: &str) -> &Sound {
        self.exists(alias, true);
        &self.sounds[alias]
    }

    /// Panics if `alias` is not registered
    pub fn find_mut(&mut self, alias: &str) -> &mut Sound {
        self.exists(alias, true);
        self.sounds
            .get_mut(alias)
            .unwrap_or_else(|| panic!("No sound matching alias '{}'.", alias))
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.sounds.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Split borrow of one sound and the shared state it plays against
    fn parts(&mut self, alias: &str) -> (&mut Sound, &mut AudioContext, &mut InstancePool, &Sender<LoadOutcome>) {
        self.exists(alias, true);
        let sound = self
            .sounds
            .get_mut(alias)
            .unwrap_or_else(|| panic!("No sound matching alias '{}'.", alias));
        (sound, &mut self.ctx, &mut self.pool, &self.loads)
    }

    /// Play a sound: whole, a sprite alias, with a completion callback, or
    /// with full options. Panics if `alias` is not registered.
    pub fn play(&mut self, alias: &str, source: impl Into<PlaySource>) -> Playback {
        let (sound, ctx, pool, loads) = self.parts(alias);
        sound.play(ctx, pool, loads, source)
    }

    /// Load and play a file once; the sound is removed after it ends or if it
    /// fails to load. Returns the generated alias.
    pub fn play_once(&mut self, options: impl Into<SoundOptions>) -> String {
        let alias = format!("play-once-{}", self.next_transient);
        self.next_transient += 1;
        let options = options.into().with_autoplay(true);
        self.transient.insert(alias.clone());
        self.add(alias.clone(), options);
        alias
    }

    pub fn stop(&mut self, alias: &str) {
        let (sound, ctx, pool, _) = self.parts(alias);
        sound.stop(ctx, pool);
    }

    pub fn pause(&mut self, alias: &str) {
        let (sound, ctx, pool, _) = self.parts(alias);
        sound.pause(ctx, pool);
    }

    pub fn resume(&mut self, alias: &str) {
        let (sound, ctx, pool, _) = self.parts(alias);
        sound.resume(ctx, pool);
    }

    pub fn volume(&self, alias: &str) -> f32 {
        self.find(alias).volume()
    }

    pub fn set_volume(&mut self, alias: &str, volume: f32) {
        let (sound, ctx, _, _) = self.parts(alias);
        sound.set_volume(ctx, volume);
    }

    pub fn speed(&self, alias: &str) -> f32 {
        self.find(alias).speed()
    }

    pub fn set_speed(&mut self, alias: &str, speed: f32) {
        let (sound, ctx, _, _) = self.parts(alias);
        sound.set_speed(ctx, speed);
    }

    /// Seconds of audio, 0 until loaded
    pub fn duration(&self, alias: &str) -> f64 {
        self.find(alias).duration()
    }

    /// Borrow one live instance for per-instance control
    pub fn instance(&mut self, alias: &str, id: InstanceId) -> Option<InstanceHandle<'_>> {
        let (sound, ctx, pool, _) = self.parts(alias);
        sound.instance(id)?;
        Some(InstanceHandle {
            sound,
            ctx,
            pool,
            id,
        })
    }

    pub fn volume_all(&self) -> f32 {
        self.ctx.volume()
    }

    pub fn set_volume_all(&mut self, volume: f32) {
        self.ctx.set_volume(volume);
        self.sync();
    }

    pub fn speed_all(&self) -> f32 {
        self.ctx.speed()
    }

    pub fn set_speed_all(&mut self, speed: f32) {
        self.ctx.set_speed(speed);
        self.sync();
    }

    pub fn toggle_mute_all(&mut self) -> bool {
        let muted = self.ctx.toggle_mute();
        self.sync();
        muted
    }

    pub fn mute_all(&mut self) {
        self.ctx.set_muted(true);
        self.sync();
    }

    pub fn unmute_all(&mut self) {
        self.ctx.set_muted(false);
        self.sync();
    }

    pub fn toggle_pause_all(&mut self) -> bool {
        let paused = self.ctx.toggle_pause();
        self.sync();
        paused
    }

    pub fn pause_all(&mut self) {
        self.ctx.set_paused(true);
        self.sync();
    }

    pub fn resume_all(&mut self) {
        self.ctx.set_paused(false);
        self.sync();
    }

    pub fn stop_all(&mut self) {
        for sound in self.sounds.values_mut() {
            sound.stop(&mut self.ctx, &mut self.pool);
        }
    }

    pub fn filters_all(&self) -> Option<&[Filter]> {
        self.ctx.filters()
    }

    /// Master filters applied after every sound
    pub fn set_filters_all(&mut self, filters: Option<Vec<Filter>>) {
        self.ctx.set_filters(filters);
    }

    /// Any sound has a live instance
    pub fn is_playing(&self) -> bool {
        self.sounds.values().any(Sound::is_playing)
    }

    /// Any sound is waiting on a load
    pub fn is_loading(&self) -> bool {
        self.sounds.values().any(Sound::is_loading)
    }

    /// Call from a user gesture to start a context that requires one
    pub fn unlock(&mut self) -> bool {
        let was_unlocked = self.ctx.is_unlocked();
        let unlocked = self.ctx.unlock();
        if unlocked && !was_unlocked {
            self.events.publish(SoundEvent::Unlocked);
        }
        unlocked
    }

    /// Broadcast pending context changes to every sound and instance
    pub fn sync(&mut self) {
        let refresh = self.ctx.take_refresh();
        if refresh.settings {
            for sound in self.sounds.values_mut() {
                sound.refresh(&mut self.ctx);
            }
        }
        if refresh.paused {
            for sound in self.sounds.values_mut() {
                sound.refresh_paused(&mut self.ctx, &mut self.pool);
            }
        }
    }

    /// Rendering-loop tick: apply finished loads, advance the context by `dt`
    /// seconds, route ended sources and poll progress
    pub fn update(&mut self, dt: f64) {
        self.sync();
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.apply_load(outcome);
        }

        let ended = self.ctx.advance(dt);
        for node in ended {
            let claimed = self
                .sounds
                .values_mut()
                .any(|sound| sound.on_node_ended(&mut self.ctx, &mut self.pool, node));
            if !claimed {
                tracing::debug!("No instance owns ended source {}", node.raw());
            }
        }

        for sound in self.sounds.values_mut() {
            sound.update(&mut self.ctx, &mut self.pool);
        }
        self.sweep_transient();
    }

    /// Block until no sound is loading or `timeout` passes, applying loads as
    /// they finish. Returns the number applied.
    pub fn flush_loads(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = 0;
        while self.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.outcomes.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.apply_load(outcome);
                    applied += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Timed out waiting for sounds to load");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.sweep_transient();
        applied
    }

    /// Drive loading until `pending` settles or `timeout` passes
    pub fn resolve(&mut self, pending: &PendingPlay, timeout: Duration) -> Option<SoundResult<InstanceId>> {
        if let Some(result) = pending.try_resolve() {
            return Some(result);
        }
        self.flush_loads(timeout);
        pending.try_resolve()
    }

    fn apply_load(&mut self, outcome: LoadOutcome) {
        match self.sounds.get_mut(&outcome.alias) {
            Some(sound) => sound.finish_load(&mut self.ctx, &mut self.pool, outcome),
            None => tracing::debug!("Dropping load result for removed sound '{}'", outcome.alias),
        }
    }

    /// Remove play-once sounds that are done
    fn sweep_transient(&mut self) {
        let done: Vec<String> = self
            .transient
            .iter()
            .filter(|alias| {
                self.sounds.get(alias.as_str()).map_or(true, |sound| {
                    sound.load_error().is_some() || (sound.is_loaded() && !sound.is_playing())
                })
            })
            .cloned()
            .collect();
        for alias in done {
            if self.sounds.contains_key(&alias) {
                self.remove(&alias);
            } else {
                self.transient.remove(&alias);
            }
        }
    }
}

impl Default for SoundLibrary {
    fn default() -> Self {
        Self::new(&LibraryConfig::default())
    }
}

/// One live instance, borrowed from the library
pub struct InstanceHandle<'a> {
    sound: &'a mut Sound,
    ctx: &'a mut AudioContext,
    pool: &'a mut InstancePool,
    id: InstanceId,
}

impl InstanceHandle<'_> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    fn read<R>(&self, op: impl FnOnce(&dyn MediaInstance) -> R) -> Option<R> {
        self.sound.instance(self.id).map(op)
    }

    fn apply(&mut self, op: impl FnOnce(&mut dyn MediaInstance, &mut AudioContext, &crate::media::SoundSettings)) {
        self.sound.with_instance(self.ctx, self.pool, self.id, op);
    }

    /// False once the instance has ended or been stopped
    pub fn is_playing(&self) -> bool {
        self.read(|i| i.is_playing()).unwrap_or(false)
    }

    pub fn progress(&self) -> f64 {
        self.read(|i| i.progress()).unwrap_or(1.0)
    }

    pub fn volume(&self) -> Option<f32> {
        self.read(|i| i.volume())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.apply(|i, ctx, sound| i.set_volume(ctx, sound, volume));
    }

    pub fn speed(&self) -> Option<f32> {
        self.read(|i| i.speed())
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.apply(|i, ctx, sound| i.set_speed(ctx, sound, speed));
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.apply(|i, ctx, sound| i.set_loop(ctx, sound, looping));
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.apply(|i, ctx, sound| i.set_muted(ctx, sound, muted));
    }

    pub fn paused(&self) -> bool {
        self.read(|i| i.paused()).unwrap_or(false)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.apply(|i, ctx, sound| i.set_paused(ctx, sound, paused));
    }

    pub fn set_filters(&mut self, filters: Option<Vec<Filter>>) {
        self.apply(|i, ctx, sound| i.set_filters(ctx, sound, filters));
    }

    pub fn stop(&mut self) {
        self.apply(|i, ctx, _| i.stop(ctx));
    }
}
