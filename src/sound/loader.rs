/// Background loading
///
/// File reads and decodes run off the calling thread; each finished load is
/// sent back as a [`LoadOutcome`] and applied on the next library tick.
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crossbeam_channel::Sender;
use regex::Regex;

use crate::audio_system::{decode_audio_data, AudioBuffer, AudioContext};
use crate::error::{SoundError, SoundResult};
use crate::media::LoadedAudio;

/// Extensions the decoder can handle, in order of preference
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "ogg", "oga", "mp3", "m4a", "mp4", "aac", "flac", "wav", "webm", "mka",
];

pub fn supported_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

pub fn is_supported(extension: &str) -> bool {
    let extension = extension.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&extension.as_str())
}

/// Expand a multi-format path like `sfx/boom.{ogg,mp3}` to the first
/// supported extension in the list. Plain paths come back unchanged.
pub fn resolve_url(url: &str) -> String {
    let Some((pattern, choice)) = format_choice(url) else {
        return url.to_string();
    };
    let mut formats = choice.split(',').map(str::trim).filter(|f| !f.is_empty());
    let preferred = formats.clone().find(|f| is_supported(f));
    let Some(extension) = preferred.or_else(|| formats.next()) else {
        return url.to_string();
    };
    if preferred.is_none() {
        tracing::warn!("None of the formats in '{}' are supported", url);
    }
    url.replacen(&pattern, extension, 1)
}

/// `("{ogg,mp3}", "ogg,mp3")` for a multi-format path
fn format_choice(url: &str) -> Option<(String, String)> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"\.(\{([^}]+)\})(\?.*)?$").ok())
        .as_ref()?;
    let captures = pattern.captures(url)?;
    Some((captures.get(1)?.as_str().to_string(), captures.get(2)?.as_str().to_string()))
}

fn extension_of(path: &str) -> Option<String> {
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Where a sound's audio comes from
#[derive(Debug, Clone)]
pub enum SoundSource {
    /// File path, possibly multi-format
    Url(String),
    /// Compressed bytes
    Bytes {
        bytes: Arc<Vec<u8>>,
        extension: Option<String>,
    },
    /// Already decoded
    Buffer(Arc<AudioBuffer>),
}

impl SoundSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { bytes, .. } => format!("{} bytes in memory", bytes.len()),
            Self::Buffer(buffer) => format!("{:.3}s decoded buffer", buffer.duration()),
        }
    }
}

/// A finished load for `alias`; `ticket` ties it to the request that started it
#[derive(Debug)]
pub struct LoadOutcome {
    pub alias: String,
    pub ticket: u64,
    pub result: SoundResult<LoadedAudio>,
}

/// Start loading `source` and report through `sender`
pub(crate) fn start_load(
    ctx: &AudioContext,
    alias: &str,
    ticket: u64,
    source: SoundSource,
    sender: Sender<LoadOutcome>,
) {
    let alias = alias.to_string();
    tracing::debug!("Loading '{}' from {}", alias, source.describe());

    match source {
        SoundSource::Buffer(buffer) => {
            send(
                &sender,
                LoadOutcome {
                    alias,
                    ticket,
                    result: Ok(LoadedAudio {
                        bytes: None,
                        buffer,
                    }),
                },
            );
        }
        SoundSource::Bytes { bytes, extension } => {
            let kept = bytes.clone();
            ctx.decode(bytes, extension, move |result| {
                let result = result.map(|buffer| LoadedAudio {
                    bytes: Some(kept),
                    buffer: Arc::new(buffer),
                });
                send(&sender, LoadOutcome { alias, ticket, result });
            });
        }
        SoundSource::Url(url) => {
            if ctx.state() == crate::audio_system::ContextState::Closed {
                send(
                    &sender,
                    LoadOutcome {
                        alias,
                        ticket,
                        result: Err(SoundError::Closed),
                    },
                );
                return;
            }
            std::thread::spawn(move || {
                let result = load_file(&url);
                send(&sender, LoadOutcome { alias, ticket, result });
            });
        }
    }
}

fn load_file(url: &str) -> SoundResult<LoadedAudio> {
    let path = resolve_url(url);
    let bytes = std::fs::read(&path).map_err(|err| SoundError::LoadFailed {
        source_desc: path.clone(),
        reason: err.to_string(),
    })?;
    tracing::info!("Read {} ({} bytes)", path, bytes.len());

    let buffer = decode_audio_data(&bytes, extension_of(&path).as_deref())?;
    Ok(LoadedAudio {
        bytes: Some(Arc::new(bytes)),
        buffer: Arc::new(buffer),
    })
}

fn send(sender: &Sender<LoadOutcome>, outcome: LoadOutcome) {
    if sender.send(outcome).is_err() {
        tracing::debug!("Load finished after its library was dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::audio_system::buffer::tests::wav_bytes;
    use crate::media::BackendKind;

    #[test]
    fn test_resolve_url_picks_supported_format() {
        assert_eq!(resolve_url("sfx/boom.{xyz,mp3,ogg}"), "sfx/boom.mp3");
        assert_eq!(resolve_url("sfx/boom.{ogg, mp3}"), "sfx/boom.ogg");
        assert_eq!(resolve_url("sfx/boom.wav"), "sfx/boom.wav");
    }

    #[test]
    fn test_resolve_url_keeps_query() {
        assert_eq!(resolve_url("a.{mp3}?v=2"), "a.mp3?v=2");
    }

    #[test]
    fn test_resolve_url_falls_back_to_first_format() {
        assert_eq!(resolve_url("a.{xyz,abc}"), "a.xyz");
    }

    #[test]
    fn test_format_choice_reuses_compiled_pattern() {
        for _ in 0..3 {
            assert_eq!(
                format_choice("a/b.{ogg,mp3}?x=1"),
                Some(("{ogg,mp3}".to_string(), "ogg,mp3".to_string()))
            );
        }
        assert_eq!(format_choice("a/b.ogg"), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("x/y.WAV").as_deref(), Some("wav"));
        assert_eq!(extension_of("x/y.mp3?cache=1").as_deref(), Some("mp3"));
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn test_missing_file_reports_load_failure() {
        let ctx = AudioContext::new(1000, false, BackendKind::WebAudio);
        let (tx, rx) = crossbeam_channel::unbounded();
        start_load(&ctx, "gone", 7, SoundSource::Url("/nonexistent/gone.wav".into()), tx);
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.alias, "gone");
        assert_eq!(outcome.ticket, 7);
        assert!(matches!(outcome.result, Err(SoundError::LoadFailed { .. })));
    }

    #[test]
    fn test_bytes_are_decoded() {
        let ctx = AudioContext::new(1000, false, BackendKind::WebAudio);
        let (tx, rx) = crossbeam_channel::unbounded();
        let bytes = Arc::new(wav_bytes(&[0.0; 4410], 44100));
        start_load(
            &ctx,
            "blip",
            1,
            SoundSource::Bytes {
                bytes,
                extension: Some("wav".into()),
            },
            tx,
        );
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let audio = outcome.result.unwrap();
        assert!((audio.buffer.duration() - 0.1).abs() < 1e-6);
        assert!(audio.bytes.is_some());
    }
}
