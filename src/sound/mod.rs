/// Sounds
///
/// A [`Sound`] is one aliased audio resource: its media, default settings,
/// sprites and the list of live instances. Every instance lifecycle event goes
/// through one handler that publishes it and, for `End`/`Stop`, removes the
/// instance, destroys it and returns it to the pool.
pub mod loader;
pub mod options;
pub mod pool;
pub mod sprite;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::audio_system::{AudioContext, NodeId};
use crate::error::{SoundError, SoundResult};
use crate::filters::Filter;
use crate::media::{create_media, InstanceEvent, InstanceId, Media, MediaInstance, SoundSettings};
use crate::messaging::{EventBus, SoundEvent};

pub use loader::{resolve_url, supported_extensions, LoadOutcome, SoundSource};
pub use options::{
    CompleteCallback, PendingPlay, PlayOptions, PlaySource, Playback, SoundOptions,
};
pub use pool::InstancePool;
pub use sprite::{SoundSprite, SoundSpriteData};

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub enum LoadState {
    Unloaded,
    Loading { ticket: u64 },
    Loaded,
    Failed(SoundError),
}

/// A play requested before the sound was loaded
struct QueuedPlay {
    options: PlayOptions,
    sender: Option<Sender<SoundResult<InstanceId>>>,
}

pub struct Sound {
    alias: String,
    media: Box<dyn Media>,
    source: Option<SoundSource>,
    settings: SoundSettings,
    single_instance: bool,
    preload: bool,
    autoplay: bool,
    sprites: HashMap<String, SoundSprite>,
    instances: Vec<Box<dyn MediaInstance>>,
    completions: HashMap<InstanceId, CompleteCallback>,
    queued: Vec<QueuedPlay>,
    state: LoadState,
    events: EventBus,
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("alias", &self.alias)
            .field("kind", &self.media.kind())
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("instances", &self.instances.len())
            .field("sprites", &self.sprites.len())
            .finish()
    }
}

impl Sound {
    /// Create a sound on the context's current backend. A decoded buffer
    /// source is attached immediately; other sources load on demand.
    pub fn new(
        alias: impl Into<String>,
        options: SoundOptions,
        ctx: &mut AudioContext,
        events: EventBus,
    ) -> Self {
        let alias = alias.into();
        let mut media = create_media(ctx);
        let source = options.source();
        let mut state = LoadState::Unloaded;

        if let Some(SoundSource::Buffer(buffer)) = &source {
            media.attach(
                ctx,
                crate::media::LoadedAudio {
                    bytes: None,
                    buffer: buffer.clone(),
                },
            );
            state = LoadState::Loaded;
        }
        if let Some(filters) = options.filters.clone() {
            media.set_filters(ctx, Some(filters));
        }

        let mut sound = Self {
            alias,
            media,
            source,
            settings: SoundSettings {
                volume: options.volume,
                muted: options.muted,
                speed: options.speed,
                looping: options.looping,
                paused: false,
            },
            single_instance: options.single_instance,
            preload: options.preload || options.autoplay,
            autoplay: options.autoplay,
            sprites: HashMap::new(),
            instances: Vec::new(),
            completions: HashMap::new(),
            queued: Vec::new(),
            state,
            events,
        };
        sound.add_sprites(options.sprites);
        tracing::debug!("Created sound '{}' ({:?})", sound.alias, sound.media.kind());
        sound
    }

    /// Kick off preload/autoplay after the sound has been registered
    pub(crate) fn activate(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        loads: &Sender<LoadOutcome>,
    ) {
        if self.is_loaded() {
            if self.autoplay {
                self.start_play(ctx, pool, PlayOptions::default());
            }
        } else if self.preload {
            self.load(ctx, loads);
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn media(&self) -> &dyn Media {
        self.media.as_ref()
    }

    pub fn source(&self) -> Option<&SoundSource> {
        self.source.as_ref()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    pub fn load_error(&self) -> Option<&SoundError> {
        match &self.state {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.is_loaded() && self.media.is_playable()
    }

    /// Any live instance, paused ones included
    pub fn is_playing(&self) -> bool {
        !self.instances.is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(|i| i.id()).collect()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&dyn MediaInstance> {
        self.instances
            .iter()
            .find(|i| i.id() == id)
            .map(|i| i.as_ref())
    }

    /// Seconds of audio, 0 until loaded
    pub fn duration(&self) -> f64 {
        self.media.duration()
    }

    pub fn settings(&self) -> &SoundSettings {
        &self.settings
    }

    pub fn single_instance(&self) -> bool {
        self.single_instance
    }

    pub fn set_single_instance(&mut self, single_instance: bool) {
        self.single_instance = single_instance;
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn preload(&self) -> bool {
        self.preload
    }

    pub fn volume(&self) -> f32 {
        self.settings.volume
    }

    pub fn set_volume(&mut self, ctx: &mut AudioContext, volume: f32) {
        self.settings.volume = volume.max(0.0);
        self.refresh(ctx);
    }

    pub fn speed(&self) -> f32 {
        self.settings.speed
    }

    pub fn set_speed(&mut self, ctx: &mut AudioContext, speed: f32) {
        self.settings.speed = speed.max(0.0);
        self.refresh(ctx);
    }

    pub fn muted(&self) -> bool {
        self.settings.muted
    }

    pub fn set_muted(&mut self, ctx: &mut AudioContext, muted: bool) {
        self.settings.muted = muted;
        self.refresh(ctx);
    }

    pub fn toggle_mute(&mut self, ctx: &mut AudioContext) -> bool {
        self.set_muted(ctx, !self.settings.muted);
        self.settings.muted
    }

    pub fn looping(&self) -> bool {
        self.settings.looping
    }

    pub fn set_loop(&mut self, ctx: &mut AudioContext, looping: bool) {
        self.settings.looping = looping;
        self.refresh(ctx);
    }

    pub fn paused(&self) -> bool {
        self.settings.paused
    }

    pub fn set_paused(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool, paused: bool) {
        self.settings.paused = paused;
        self.refresh_paused(ctx, pool);
    }

    pub fn pause(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        self.set_paused(ctx, pool, true);
    }

    pub fn resume(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        self.set_paused(ctx, pool, false);
    }

    pub fn toggle_pause(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) -> bool {
        self.set_paused(ctx, pool, !self.settings.paused);
        self.settings.paused
    }

    pub fn filters(&self) -> Option<&[Filter]> {
        self.media.filters()
    }

    /// Filters applied to every instance of this sound
    pub fn set_filters(&mut self, ctx: &mut AudioContext, filters: Option<Vec<Filter>>) {
        self.media.set_filters(ctx, filters);
    }

    pub fn sprite(&self, alias: &str) -> Option<&SoundSprite> {
        self.sprites.get(alias)
    }

    pub fn sprites(&self) -> &HashMap<String, SoundSprite> {
        &self.sprites
    }

    /// Panics when `alias` is already taken or `data` is an empty range
    pub fn add_sprite(&mut self, alias: impl Into<String>, data: SoundSpriteData) -> &SoundSprite {
        let alias = alias.into();
        assert!(
            !self.sprites.contains_key(&alias),
            "Alias {} is already taken",
            alias
        );
        self.sprites
            .entry(alias)
            .or_insert_with(|| SoundSprite::new(data))
    }

    pub fn add_sprites(&mut self, sprites: HashMap<String, SoundSpriteData>) {
        for (alias, data) in sprites {
            self.add_sprite(alias, data);
        }
    }

    /// Remove one sprite, or all of them with `None`
    pub fn remove_sprites(&mut self, alias: Option<&str>) {
        match alias {
            Some(alias) => {
                self.sprites.remove(alias);
            }
            None => self.sprites.clear(),
        }
    }

    /// Start loading if not loaded or loading. Returns true when a load started.
    pub fn load(&mut self, ctx: &AudioContext, loads: &Sender<LoadOutcome>) -> bool {
        if matches!(self.state, LoadState::Loading { .. } | LoadState::Loaded) {
            return false;
        }
        let Some(source) = self.source.clone() else {
            self.fail_load(SoundError::MissingSource(self.alias.clone()));
            return false;
        };
        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        self.state = LoadState::Loading { ticket };
        loader::start_load(ctx, &self.alias, ticket, source, loads.clone());
        true
    }

    /// Apply a finished load. Outcomes from superseded requests are ignored.
    pub(crate) fn finish_load(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        outcome: LoadOutcome,
    ) {
        let LoadState::Loading { ticket } = self.state else {
            tracing::debug!("Ignoring load result for '{}' that is not loading", self.alias);
            return;
        };
        if ticket != outcome.ticket {
            tracing::debug!("Ignoring stale load result for '{}'", self.alias);
            return;
        }

        let audio = match outcome.result {
            Ok(audio) => audio,
            Err(err) => {
                self.fail_load(err);
                return;
            }
        };

        self.media.attach(ctx, audio);
        self.state = LoadState::Loaded;
        tracing::info!("Loaded '{}' ({:.3}s)", self.alias, self.duration());
        self.events.publish(SoundEvent::Loaded {
            alias: self.alias.clone(),
            duration: self.duration(),
        });

        let queued = std::mem::take(&mut self.queued);
        if queued.is_empty() {
            if self.autoplay {
                self.start_play(ctx, pool, PlayOptions::default());
            }
            return;
        }
        for play in queued {
            let id = self.start_play(ctx, pool, play.options);
            if let Some(sender) = play.sender {
                let _ = sender.send(Ok(id));
            }
        }
    }

    fn fail_load(&mut self, err: SoundError) {
        tracing::warn!("Failed to load '{}': {}", self.alias, err);
        self.events.publish(SoundEvent::LoadFailed {
            alias: self.alias.clone(),
            error: err.to_string(),
        });
        for play in self.queued.drain(..) {
            if let Some(sender) = play.sender {
                let _ = sender.send(Err(err.clone()));
            }
        }
        self.state = LoadState::Failed(err);
    }

    /// Play the whole sound, a sprite, or with explicit options.
    ///
    /// An unloaded sound queues the play, starts loading and returns
    /// [`Playback::Pending`]. Panics on an unknown sprite alias.
    pub fn play(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        loads: &Sender<LoadOutcome>,
        source: impl Into<PlaySource>,
    ) -> Playback {
        let options = source.into().into_options();
        if let Some(sprite) = options.sprite.as_deref() {
            assert!(
                self.sprites.contains_key(sprite),
                "Alias {} is not available",
                sprite
            );
        }

        if !self.is_playable() {
            let (sender, receiver) = crossbeam_channel::bounded(1);
            self.queued.push(QueuedPlay {
                options,
                sender: Some(sender),
            });
            self.load(ctx, loads);
            return Playback::Pending(PendingPlay::new(receiver));
        }

        Playback::Started(self.start_play(ctx, pool, options))
    }

    fn start_play(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        options: PlayOptions,
    ) -> InstanceId {
        let sprite = options.sprite.as_deref().map(|alias| {
            self.sprites
                .get(alias)
                .unwrap_or_else(|| panic!("Alias {} is not available", alias))
                .clone()
        });
        let (options, single_instance, complete) = options.resolve(sprite.as_ref());

        if self.single_instance || single_instance {
            self.stop(ctx, pool);
        }

        let mut instance = pool.acquire(self.media.as_ref());
        let id = instance.id();
        if let Some(complete) = complete {
            self.completions.insert(id, complete);
        }
        tracing::debug!("Playing '{}' on instance {}", self.alias, id);
        instance.play(ctx, &self.settings, options);
        self.instances.push(instance);
        self.handle_events(self.instances.len() - 1, ctx, pool);
        id
    }

    /// Stop every live instance. Walks the list backwards because each stop
    /// removes its instance. Also drops plays still waiting on a load.
    pub fn stop(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        if !self.queued.is_empty() {
            tracing::debug!("Dropping {} queued play(s) of '{}'", self.queued.len(), self.alias);
            self.queued.clear();
        }
        for index in (0..self.instances.len()).rev() {
            self.instances[index].stop(ctx);
            self.handle_events(index, ctx, pool);
        }
    }

    /// Run `op` against one live instance, then route its events
    pub(crate) fn with_instance<R>(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        id: InstanceId,
        op: impl FnOnce(&mut dyn MediaInstance, &mut AudioContext, &SoundSettings) -> R,
    ) -> Option<R> {
        let index = self.instances.iter().position(|i| i.id() == id)?;
        let result = op(self.instances[index].as_mut(), ctx, &self.settings);
        self.handle_events(index, ctx, pool);
        Some(result)
    }

    /// Recompute volume, speed, loop and filters on every instance
    pub fn refresh(&mut self, ctx: &mut AudioContext) {
        for instance in self.instances.iter_mut() {
            instance.refresh(ctx, &self.settings);
        }
    }

    /// Re-evaluate pause on every instance
    pub fn refresh_paused(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        for instance in self.instances.iter_mut() {
            instance.refresh_paused(ctx, &self.settings);
        }
        self.handle_all_events(ctx, pool);
    }

    /// Per-tick progress poll
    pub fn update(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        for instance in self.instances.iter_mut() {
            instance.update(ctx, &self.settings);
        }
        self.handle_all_events(ctx, pool);
    }

    /// Route a platform "ended" notification. Returns true if one of this
    /// sound's instances owned `node`.
    pub fn on_node_ended(
        &mut self,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
        node: NodeId,
    ) -> bool {
        let Some(index) = self
            .instances
            .iter_mut()
            .position(|instance| instance.on_ended(ctx, node))
        else {
            return false;
        };
        self.handle_events(index, ctx, pool);
        true
    }

    fn handle_all_events(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        let mut index = 0;
        while index < self.instances.len() {
            if !self.handle_events(index, ctx, pool) {
                index += 1;
            }
        }
    }

    /// Publish the instance's queued events. On `End` or `Stop` the instance is
    /// removed, destroyed and pooled, and on `End` its completion callback runs.
    /// Returns true when the instance was removed.
    fn handle_events(
        &mut self,
        index: usize,
        ctx: &mut AudioContext,
        pool: &mut InstancePool,
    ) -> bool {
        let Some(instance) = self.instances.get_mut(index) else {
            return false;
        };
        let id = instance.id();
        let mut finished = None;

        for event in instance.take_events() {
            let alias = self.alias.clone();
            let event = match event {
                InstanceEvent::Start => SoundEvent::Started { alias, instance: id },
                InstanceEvent::Progress { progress, duration } => SoundEvent::Progress {
                    alias,
                    instance: id,
                    progress,
                    duration,
                },
                InstanceEvent::Paused => SoundEvent::Paused { alias, instance: id },
                InstanceEvent::Resumed => SoundEvent::Resumed { alias, instance: id },
                InstanceEvent::End => {
                    finished = Some(true);
                    SoundEvent::Ended { alias, instance: id }
                }
                InstanceEvent::Stop => {
                    finished = Some(false);
                    SoundEvent::Stopped { alias, instance: id }
                }
            };
            self.events.publish(event);
        }

        let Some(ended) = finished else {
            return false;
        };

        let mut instance = self.instances.remove(index);
        instance.destroy(ctx);
        pool.release(instance);
        tracing::debug!(
            "Instance {} of '{}' {}",
            id,
            self.alias,
            if ended { "ended" } else { "stopped" }
        );

        let complete = self.completions.remove(&id);
        if let (true, Some(complete)) = (ended, complete) {
            complete(&*self);
        }
        true
    }

    /// Stop and pool every instance, then release the media
    pub fn destroy(&mut self, ctx: &mut AudioContext, pool: &mut InstancePool) {
        self.stop(ctx, pool);
        self.completions.clear();
        self.sprites.clear();
        self.media.destroy(ctx);
        self.state = LoadState::Unloaded;
        tracing::debug!("Destroyed sound '{}'", self.alias);
    }
}
