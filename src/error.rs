use std::sync::Arc;

use thiserror::Error;

/// Library-level errors using thiserror for structured error handling.
///
/// Load and decode failures travel through the pending-play channel and the
/// event bus, so every variant is cheap to clone: one failed load rejects every
/// play that was queued behind it.
#[derive(Error, Debug, Clone)]
pub enum SoundError {
    #[error("Failed to load audio from {source_desc}: {reason}")]
    LoadFailed { source_desc: String, reason: String },

    #[error("Unable to decode file")]
    DecodeFailed(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("Sound '{0}' has no source to load from")]
    MissingSource(String),

    #[error("I/O error")]
    Io(#[source] Arc<std::io::Error>),

    #[error("Audio context is closed")]
    Closed,

    #[error("Play request was dropped before the sound finished loading")]
    Canceled,
}

impl From<std::io::Error> for SoundError {
    fn from(err: std::io::Error) -> Self {
        SoundError::Io(Arc::new(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias for library operations
pub type SoundResult<T> = Result<T, SoundError>;

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = SoundError::MissingSource("boom".to_string());
        assert_eq!(err.to_string(), "Sound 'boom' has no source to load from");

        let err = SoundError::DecodeFailed(Arc::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "garbage",
        )));
        assert_eq!(err.to_string(), "Unable to decode file");
    }

    #[test]
    fn test_error_source_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/sounds.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/sounds.json"
        );
    }

    #[test]
    fn test_sound_error_is_cloneable_with_source() {
        let err: SoundError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let copy = err.clone();
        assert!(copy.source().is_some());
        assert_eq!(copy.to_string(), "I/O error");
    }
}
