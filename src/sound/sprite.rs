/// Named sub-regions of a sound's buffer
use serde::{Deserialize, Serialize};

/// Sprite definition as it appears in a manifest:
/// `{"start": 1.0, "end": 2.5, "speed": 1.5, "loop": false}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundSpriteData {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
}

impl SoundSpriteData {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            speed: None,
            looping: None,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundSprite {
    start: f64,
    end: f64,
    speed: Option<f32>,
    looping: bool,
}

impl SoundSprite {
    /// Panics when `end <= start`
    pub fn new(data: SoundSpriteData) -> Self {
        assert!(
            data.end > data.start,
            "Sprite end time ({}) must be after its start time ({})",
            data.end,
            data.start
        );
        Self {
            start: data.start,
            end: data.end,
            speed: data.speed,
            looping: data.looping.unwrap_or(false),
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn speed(&self) -> Option<f32> {
        self.speed
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl From<SoundSpriteData> for SoundSprite {
    fn from(data: SoundSpriteData) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let sprite = SoundSprite::new(SoundSpriteData::new(3.0, 5.0));
        assert_eq!(sprite.duration(), 2.0);
        assert!(!sprite.looping());
        assert_eq!(sprite.speed(), None);
    }

    #[test]
    #[should_panic(expected = "must be after its start time")]
    fn test_end_before_start_panics() {
        SoundSprite::new(SoundSpriteData::new(5.0, 3.0));
    }

    #[test]
    fn test_manifest_format() {
        let data: SoundSpriteData =
            serde_json::from_str(r#"{"start": 1.0, "end": 2.5, "speed": 1.5}"#).unwrap();
        assert_eq!(data, SoundSpriteData::new(1.0, 2.5).with_speed(1.5));

        let data: SoundSpriteData =
            serde_json::from_str(r#"{"start": 0, "end": 1, "loop": true}"#).unwrap();
        assert_eq!(data.looping, Some(true));
    }
}
