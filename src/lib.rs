//! Sound playback library
//!
//! Sounds are registered by alias in a [`SoundLibrary`] and played as cheap
//! per-play instances cloned from a shared media template. Every instance mixes
//! three levels of volume, speed, mute and pause (instance, sound, context),
//! and filter chains can be spliced in at the sound, instance or master level.
//!
//! ```rust,ignore
//! use soundstage::{LibraryConfig, PlayOptions, SoundLibrary, SoundOptions};
//!
//! let mut library = SoundLibrary::new(&LibraryConfig::default());
//! library.add("boom", SoundOptions::from_url("assets/boom.{ogg,mp3}").with_preload(true));
//! library.flush_loads(std::time::Duration::from_secs(5));
//! library.play("boom", PlayOptions::default().with_volume(0.5));
//! loop {
//!     library.update(1.0 / 60.0);
//! }
//! ```

pub mod audio_system;
pub mod config;
pub mod element;
pub mod error;
pub mod filters;
pub mod library;
pub mod media;
pub mod messaging;
pub mod sound;
pub mod utils;
pub mod webaudio;

pub use audio_system::{AudioBuffer, AudioContext, ContextState};
pub use config::LibraryConfig;
pub use error::{AppResult, ConfigError, SoundError, SoundResult};
pub use filters::{Filter, Filterable};
pub use library::{InstanceHandle, SoundLibrary};
pub use media::{BackendKind, InstanceId};
pub use messaging::{EventBus, SoundEvent};
pub use sound::{
    LoadState, PendingPlay, PlayOptions, PlaySource, Playback, Sound, SoundOptions, SoundSprite,
    SoundSpriteData,
};
