/// Real output for element instances, driven through a rodio sink
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::{SoundError, SoundResult};

pub struct ElementOutput {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
}

impl std::fmt::Debug for ElementOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementOutput")
            .field("paused", &self.sink.is_paused())
            .finish()
    }
}

fn output_error(reason: impl ToString) -> SoundError {
    SoundError::LoadFailed {
        source_desc: "audio output".to_string(),
        reason: reason.to_string(),
    }
}

impl ElementOutput {
    /// Open the default device and queue `bytes` from `start`, for `end - start`
    /// seconds when an end is given, looping the whole file when `looping`
    pub fn open(bytes: &Arc<Vec<u8>>, start: f64, end: Option<f64>, looping: bool) -> SoundResult<Self> {
        let (stream, handle) = OutputStream::try_default().map_err(output_error)?;
        let sink = Sink::try_new(&handle).map_err(output_error)?;
        let cursor = Cursor::new((**bytes).clone());

        let start = Duration::from_secs_f64(start.max(0.0));
        if looping {
            let source = Decoder::new_looped(cursor).map_err(output_error)?;
            sink.append(source.skip_duration(start));
        } else {
            let source = Decoder::new(cursor).map_err(output_error)?.skip_duration(start);
            match end {
                Some(end) => {
                    let length = Duration::from_secs_f64((end - start.as_secs_f64()).max(0.0));
                    sink.append(source.take_duration(length));
                }
                None => sink.append(source),
            }
        }
        sink.play();

        tracing::debug!("Opened element output at {:?}", start);
        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
        })
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.max(0.0));
    }

    pub fn set_speed(&self, speed: f32) {
        self.sink.set_speed(speed.max(0.01));
    }

    pub fn pause(&self) {
        self.sink.pause();
    }

    pub fn resume(&self) {
        self.sink.play();
    }

    pub fn stop(&self) {
        self.sink.stop();
    }
}
