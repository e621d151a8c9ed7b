//! Speech settings shared between the host and the dispatcher

use pecs_core::PecsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const MAX_PITCH: u8 = 99;

/// Which engines the dispatcher tries, in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineChoice {
    /// Piper, then espeak-ng
    #[default]
    Auto,
    /// Piper preferred; espeak-ng still catches failures
    Piper,
    /// espeak-ng only
    Espeak,
}

impl FromStr for EngineChoice {
    type Err = PecsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(EngineChoice::Auto),
            "piper" => Ok(EngineChoice::Piper),
            "espeak" | "espeak-ng" => Ok(EngineChoice::Espeak),
            other => Err(PecsError::ConfigError(format!(
                "unknown speech engine '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub engine: EngineChoice,
    /// 1.0 is normal rate
    pub speed: f32,
    /// espeak-ng pitch, 0..=99
    pub pitch: u8,
    /// Language code -> voice. A value ending in `.onnx` names a Piper model,
    /// anything else an espeak-ng voice.
    pub voices: HashMap<String, String>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            engine: EngineChoice::Auto,
            speed: 1.0,
            pitch: 50,
            voices: HashMap::new(),
        }
    }
}

impl TtsSettings {
    /// Merge `patch` in, clamping speed and pitch to their ranges
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(engine) = patch.engine {
            self.engine = engine;
        }
        if let Some(speed) = patch.speed {
            if speed.is_finite() {
                self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
            }
        }
        if let Some(pitch) = patch.pitch {
            self.pitch = pitch.min(MAX_PITCH);
        }
        for (lang, voice) in patch.voices {
            let lang = lang.trim().to_lowercase();
            if voice.trim().is_empty() {
                self.voices.remove(&lang);
            } else {
                self.voices.insert(lang, voice.trim().to_string());
            }
        }
    }

    pub fn voice_for(&self, lang: &str) -> Option<&str> {
        self.voices.get(&lang.to_lowercase()).map(String::as_str)
    }
}

/// Partial update for [`TtsSettings`]; `None` leaves a field unchanged.
/// An empty voice string removes the override for that language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub engine: Option<EngineChoice>,
    pub speed: Option<f32>,
    pub pitch: Option<u8>,
    pub voices: HashMap<String, String>,
}

/// Settings owned by the host and read by the dispatcher on every utterance
pub type SharedSettings = Arc<RwLock<TtsSettings>>;

pub fn shared(settings: TtsSettings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_clamps_ranges() {
        let mut settings = TtsSettings::default();
        settings.apply(SettingsPatch {
            speed: Some(5.0),
            pitch: Some(200),
            ..Default::default()
        });
        assert_eq!(settings.speed, MAX_SPEED);
        assert_eq!(settings.pitch, MAX_PITCH);

        settings.apply(SettingsPatch {
            speed: Some(0.1),
            ..Default::default()
        });
        assert_eq!(settings.speed, MIN_SPEED);

        settings.apply(SettingsPatch {
            speed: Some(f32::NAN),
            ..Default::default()
        });
        assert_eq!(settings.speed, MIN_SPEED);
    }

    #[test]
    fn test_apply_merges_voices() {
        let mut settings = TtsSettings::default();
        settings.apply(SettingsPatch {
            engine: Some(EngineChoice::Espeak),
            voices: HashMap::from([
                ("SV".to_string(), "sv+f3".to_string()),
                ("en".to_string(), "en-us".to_string()),
            ]),
            ..Default::default()
        });
        assert_eq!(settings.engine, EngineChoice::Espeak);
        assert_eq!(settings.voice_for("sv"), Some("sv+f3"));

        settings.apply(SettingsPatch {
            voices: HashMap::from([("en".to_string(), String::new())]),
            ..Default::default()
        });
        assert_eq!(settings.voice_for("en"), None);
        assert_eq!(settings.voice_for("sv"), Some("sv+f3"));
        // untouched fields survive
        assert_eq!(settings.pitch, 50);
    }

    #[test]
    fn test_engine_choice_parse() {
        assert_eq!("Piper".parse::<EngineChoice>().unwrap(), EngineChoice::Piper);
        assert_eq!(
            "espeak-ng".parse::<EngineChoice>().unwrap(),
            EngineChoice::Espeak
        );
        assert!("festival".parse::<EngineChoice>().is_err());
    }
}
