use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sound::SoundOptions;

/// Library settings plus an optional manifest of sounds to register
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Use the media-element backend instead of the node graph
    pub use_legacy: bool,

    /// Global volume (0.0 and up)
    pub volume: f32,

    /// Global speed multiplier
    pub speed: f32,

    pub muted: bool,

    /// Sample rate of the audio context
    pub sample_rate: u32,

    /// Keep the context suspended until `unlock` is called from a user gesture
    pub require_gesture: bool,

    /// Sounds to add on startup, by alias
    pub sounds: HashMap<String, SoundOptions>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            use_legacy: false,
            volume: 1.0,
            speed: 1.0,
            muted: false,
            sample_rate: 44100,
            require_gesture: false,
            sounds: HashMap::new(),
        }
    }
}

impl LibraryConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(err),
        })?;
        let config = Self::from_json(&content).map_err(|err| match err {
            ConfigError::Invalid(reason) => ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: reason.into(),
            },
            other => other,
        })?;
        tracing::info!(
            "Loaded config from {} ({} sound(s))",
            path.display(),
            config.sounds.len()
        );
        Ok(config)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LibraryConfig =
            serde_json::from_str(json).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::SaveFailed {
                path: path.display().to_string(),
                source,
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| save_failed(Box::new(err)))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| save_failed(Box::new(err)))?;
        fs::write(path, json).map_err(|err| save_failed(Box::new(err)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.volume < 0.0 || self.speed < 0.0 {
            return Err(ConfigError::Invalid(
                "volume and speed must not be negative".into(),
            ));
        }
        for (alias, sound) in &self.sounds {
            if sound.url.is_none() {
                return Err(ConfigError::Invalid(format!("sound '{}' has no url", alias)));
            }
            for (sprite, data) in &sound.sprites {
                if data.end <= data.start {
                    return Err(ConfigError::Invalid(format!(
                        "sprite '{}' of '{}' ends before it starts",
                        sprite, alias
                    )));
                }
            }
        }
        Ok(())
    }
}
