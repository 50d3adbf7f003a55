use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use crate::audio_system::AudioBuffer;

pub use crate::sound::{resolve_url, supported_extensions};

/// Wall-clock driver for [`crate::SoundLibrary::update`]
pub struct Ticker {
    last_tick: Option<Instant>,
    interval: Duration,
}

impl Ticker {
    /// Create a ticker targeting `hz` updates per second
    pub fn new(hz: u32) -> Self {
        Self {
            last_tick: None,
            interval: Duration::from_secs_f64(1.0 / hz.max(1) as f64),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Seconds since the previous tick; 0 on the first call
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let dt = match self.last_tick {
            None => 0.0,
            Some(last) => now.duration_since(last).as_secs_f64(),
        };
        self.last_tick = Some(now);
        dt
    }

    /// Sleep out the rest of the current interval
    pub fn wait(&self) {
        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

/// Mono sine wave at half amplitude
pub fn sine_tone(hz: f64, seconds: f64, sample_rate: u32) -> AudioBuffer {
    let length = (seconds.max(0.0) * sample_rate as f64).round() as usize;
    let samples = (0..length)
        .map(|i| (0.5 * (TAU * hz * i as f64 / sample_rate as f64).sin()) as f32)
        .collect();
    AudioBuffer::from_channels(vec![samples], sample_rate)
}

/// Mono silence
pub fn silence(seconds: f64, sample_rate: u32) -> AudioBuffer {
    let length = (seconds.max(0.0) * sample_rate as f64).round() as usize;
    AudioBuffer::new(1, length, sample_rate)
}
