use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pecs_audio::{DispatcherConfig, EngineChoice, OverlapPolicy, SettingsPatch, TtsSettings};
use pecs_core::{ArasaacConfig, PictogramConfig, SearchMode};

/// High-level configuration for the board host
#[derive(Clone, Debug)]
pub struct PecsBoardConfig {
    pub pictogram: PictogramConfig,
    pub arasaac: ArasaacConfig,
    pub tts: TtsSettings,
    pub dispatcher: DispatcherConfig,
    pub board: BoardConfig,
}

/// How the board looks things up and speaks
#[derive(Clone, Debug)]
pub struct BoardConfig {
    /// Language of the card search terms
    pub lang: String,
    /// Language the sentence is spoken in
    pub speech_lang: String,
    /// Requested pictogram size; snapped to a supported resolution
    pub resolution: u32,
    pub search_mode: SearchMode,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            speech_lang: std::env::var("PECS_SPEECH_LANG")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "sv".to_string()),
            resolution: 96,
            search_mode: SearchMode::Smart,
        }
    }
}

impl Default for PecsBoardConfig {
    fn default() -> Self {
        // Component defaults already consider env vars
        Self {
            pictogram: PictogramConfig::default(),
            arasaac: ArasaacConfig::default(),
            tts: TtsSettings::default(),
            dispatcher: DispatcherConfig::default(),
            board: BoardConfig::default(),
        }
    }
}

impl PecsBoardConfig {
    /// Load configuration from a TOML file (path via PECS_BOARD_CONFIG or ./pecs_board.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("PECS_BOARD_CONFIG").unwrap_or_else(|_| "pecs_board.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target: "pecs_board", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<PecsBoardToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "pecs_board", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "pecs_board", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PecsBoardToml {
    pub pictogram: Option<PictogramToml>,
    pub arasaac: Option<ArasaacToml>,
    pub tts: Option<TtsToml>,
    pub board: Option<BoardToml>,
}

impl PecsBoardToml {
    fn overlay(self, mut base: PecsBoardConfig) -> PecsBoardConfig {
        if let Some(p) = self.pictogram {
            p.apply(&mut base.pictogram);
        }
        if let Some(a) = self.arasaac {
            a.apply(&mut base.arasaac);
        }
        if let Some(t) = self.tts {
            t.apply(&mut base.tts, &mut base.dispatcher);
        }
        if let Some(b) = self.board {
            b.apply(&mut base.board);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PictogramToml {
    pub cache_dir: Option<PathBuf>,
    pub resolutions: Option<Vec<u32>>,
    pub default_resolution: Option<u32>,
    pub cache_misses: Option<bool>,
}
impl PictogramToml {
    fn apply(self, p: &mut PictogramConfig) {
        if let Some(x) = self.cache_dir {
            p.cache_dir = x;
        }
        if let Some(x) = self.resolutions {
            let x: Vec<u32> = x.into_iter().filter(|r| *r > 0).collect();
            if !x.is_empty() {
                p.resolutions = x;
            }
        }
        if let Some(x) = self.default_resolution {
            p.default_resolution = x;
        }
        if let Some(x) = self.cache_misses {
            p.cache_misses = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ArasaacToml {
    pub api_base: Option<String>,
    pub search_timeout_ms: Option<u64>,
    pub image_timeout_ms: Option<u64>,
}
impl ArasaacToml {
    fn apply(self, a: &mut ArasaacConfig) {
        if let Some(x) = self.api_base {
            a.api_base = x;
        }
        if let Some(x) = self.search_timeout_ms {
            a.search_timeout_ms = x;
        }
        if let Some(x) = self.image_timeout_ms {
            a.image_timeout_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsToml {
    pub engine: Option<EngineChoice>,
    pub speed: Option<f32>,
    pub pitch: Option<u8>,
    pub voices: Option<HashMap<String, String>>,
    pub overlap: Option<OverlapPolicy>,
    pub default_lang: Option<String>,
}
impl TtsToml {
    fn apply(self, t: &mut TtsSettings, d: &mut DispatcherConfig) {
        // same clamping as runtime configure()
        t.apply(SettingsPatch {
            engine: self.engine,
            speed: self.speed,
            pitch: self.pitch,
            voices: self.voices.unwrap_or_default(),
        });
        if let Some(x) = self.overlap {
            d.overlap = x;
        }
        if let Some(x) = self.default_lang {
            d.default_lang = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct BoardToml {
    pub lang: Option<String>,
    pub speech_lang: Option<String>,
    pub resolution: Option<u32>,
    pub search_mode: Option<SearchMode>,
}
impl BoardToml {
    fn apply(self, b: &mut BoardConfig) {
        if let Some(x) = self.lang {
            b.lang = x;
        }
        if let Some(x) = self.speech_lang {
            b.speech_lang = x;
        }
        if let Some(x) = self.resolution {
            b.resolution = x;
        }
        if let Some(x) = self.search_mode {
            b.search_mode = x;
        }
    }
}
