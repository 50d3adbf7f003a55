/// Sound events
///
/// Notifications of things that happened to sounds and instances. For one
/// instance play the order is `Started`, zero or more `Progress` (with
/// `Paused`/`Resumed` interleaved), then exactly one of `Ended` or `Stopped`.
use crate::media::InstanceId;

#[derive(Debug, Clone, PartialEq)]
pub enum SoundEvent {
    /// Audio for `alias` finished loading and is playable
    Loaded { alias: String, duration: f64 },

    /// Loading `alias` failed; the sound stays unloaded
    LoadFailed { alias: String, error: String },

    Started { alias: String, instance: InstanceId },

    /// Per-tick progress, 0..=1 of the play's span
    Progress {
        alias: String,
        instance: InstanceId,
        progress: f64,
        duration: f64,
    },

    Paused { alias: String, instance: InstanceId },

    Resumed { alias: String, instance: InstanceId },

    /// Reached its end naturally
    Ended { alias: String, instance: InstanceId },

    /// Cut off by `stop`
    Stopped { alias: String, instance: InstanceId },

    /// The audio context accepted a user gesture and is running
    Unlocked,
}

impl SoundEvent {
    /// Alias the event concerns, if any
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::Loaded { alias, .. }
            | Self::LoadFailed { alias, .. }
            | Self::Started { alias, .. }
            | Self::Progress { alias, .. }
            | Self::Paused { alias, .. }
            | Self::Resumed { alias, .. }
            | Self::Ended { alias, .. }
            | Self::Stopped { alias, .. } => Some(alias),
            Self::Unlocked => None,
        }
    }

    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::Started { instance, .. }
            | Self::Progress { instance, .. }
            | Self::Paused { instance, .. }
            | Self::Resumed { instance, .. }
            | Self::Ended { instance, .. }
            | Self::Stopped { instance, .. } => Some(*instance),
            _ => None,
        }
    }

    /// Ended or Stopped
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended { .. } | Self::Stopped { .. })
    }
}
