/// Decoded PCM audio
///
/// Planar f32 sample storage plus the symphonia decode routine that produces it.
use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{SoundError, SoundResult};

/// Decoded audio data, one sample vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(channel_count: usize, length: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: vec![vec![0.0; length]; channel_count.max(1)],
        }
    }

    /// Wrap existing planar channel data. All channels are truncated to the shortest one.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let length = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut channels = channels;
        for channel in &mut channels {
            channel.truncate(length);
        }
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames
    pub fn length(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }
}

fn decode_error(message: &str) -> SoundError {
    SoundError::DecodeFailed(Arc::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.to_string(),
    )))
}

fn symphonia_error(err: SymphoniaError) -> SoundError {
    SoundError::DecodeFailed(Arc::new(err))
}

/// Decode compressed audio bytes (wav, ogg, mp3, flac, ...) into an [`AudioBuffer`].
///
/// `extension` is only a probe hint; the container is sniffed from the data.
pub fn decode_audio_data(bytes: &[u8], extension: Option<&str>) -> SoundResult<AudioBuffer> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(symphonia_error)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error("no supported audio tracks found"))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(symphonia_error)?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // Track list changed mid-stream; keep what was decoded so far
            Err(SymphoniaError::ResetRequired) => break,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(symphonia_error(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channel_count = spec.channels.count();
                if channels.is_empty() {
                    channels = vec![Vec::new(); channel_count];
                }
                sample_rate.get_or_insert(spec.rate);

                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                for frame in samples.samples().chunks(channel_count) {
                    for (channel, sample) in channels.iter_mut().zip(frame) {
                        channel.push(*sample);
                    }
                }
            }
            // Skip corrupt packets
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(symphonia_error(err)),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| decode_error("unknown sample rate"))?;
    if channels.is_empty() {
        return Err(decode_error("no audio frames decoded"));
    }

    tracing::debug!(
        "Decoded {} channel(s), {} frames at {} Hz",
        channels.len(),
        channels[0].len(),
        sample_rate
    );

    Ok(AudioBuffer::from_channels(channels, sample_rate))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a mono 16-bit WAV in memory
    pub(crate) fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for sample in samples {
                writer
                    .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(2, 4410, 44100);
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.length(), 4410);
        assert!((buffer.duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_from_channels_truncates_to_shortest() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.0; 10], vec![0.0; 7]], 10);
        assert_eq!(buffer.length(), 7);
        assert_eq!(buffer.channel(1).map(|c| c.len()), Some(7));
    }

    #[test]
    fn test_decode_wav() {
        let bytes = wav_bytes(&vec![0.0; 4800], 48000);
        let buffer = decode_audio_data(&bytes, Some("wav")).unwrap();
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.number_of_channels(), 1);
        assert_eq!(buffer.length(), 4800);
        assert!((buffer.duration() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decode_preserves_samples() {
        let bytes = wav_bytes(&[0.5, -0.5, 0.25, 0.0], 8000);
        let buffer = decode_audio_data(&bytes, None).unwrap();
        let channel = buffer.channel(0).unwrap();
        assert!((channel[0] - 0.5).abs() < 1e-3);
        assert!((channel[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_audio_data(b"definitely not audio", None).unwrap_err();
        assert!(matches!(err, SoundError::DecodeFailed(_)));
        assert_eq!(err.to_string(), "Unable to decode file");
    }
}
