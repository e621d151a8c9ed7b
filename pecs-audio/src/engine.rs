//! Speech engines
//!
//! Engines are strategies the dispatcher tries in order:
//! - Piper synthesizes to a temporary WAV that a [`PlayerChain`] plays
//! - espeak-ng streams audio to the sound device itself
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE_DIR, TTS_TEMP_DIR
//! - ESPEAK_BIN
//!
//! Child processes are spawned with `kill_on_drop`, so dropping a `speak`
//! future stops synthesis and playback.

use crate::player::PlayerChain;
use crate::utils::{gen_id, get_from_env_or_path, get_from_path};
use async_trait::async_trait;
use pecs_core::{PecsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

pub const PIPER: &str = "piper";
pub const ESPEAK: &str = "espeak-ng";

/// One request as seen by an engine, with settings already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: String,
    pub text: String,
    pub lang: String,
    pub speed: f32,
    pub pitch: u8,
    /// Per-language override from the settings
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub engine: String,
    /// Value to put in the per-language voice setting
    pub name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this engine can speak `utterance` at all
    fn is_available(&self, utterance: &Utterance) -> bool;

    /// Speak to completion
    async fn speak(&self, utterance: &Utterance) -> Result<()>;

    async fn voices(&self, _lang: &str) -> Vec<VoiceInfo> {
        Vec::new()
    }

    /// Short summary for status lines; `None` when the engine is not installed
    fn describe(&self) -> Option<String> {
        None
    }
}

fn is_piper_model(voice: &str) -> bool {
    voice.ends_with(".onnx")
}

// =============================================================================
// Piper
// =============================================================================

#[derive(Debug, Clone)]
pub struct PiperConfig {
    pub bin: Option<PathBuf>,
    /// Searched in order; the first one holding any `.onnx` model is used
    pub voice_dirs: Vec<PathBuf>,
    /// Language code -> default model file name
    pub models: HashMap<String, String>,
    pub temp_dir: PathBuf,
    pub synth_timeout_ms: u64,
}

impl Default for PiperConfig {
    fn default() -> Self {
        let mut voice_dirs = Vec::new();
        if let Ok(dir) = std::env::var("PIPER_VOICE_DIR") {
            voice_dirs.push(PathBuf::from(dir));
        }
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            if !xdg.is_empty() {
                voice_dirs.push(PathBuf::from(xdg).join("piper-voices"));
            }
        }
        if let Some(home) = dirs::home_dir() {
            voice_dirs.push(home.join(".local/share/piper-voices"));
        }
        voice_dirs.push(PathBuf::from("/usr/share/piper-voices"));
        voice_dirs.push(PathBuf::from("/usr/local/share/piper-voices"));

        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Self {
            bin: get_from_env_or_path("PIPER_BIN", "piper"),
            voice_dirs,
            models: HashMap::from([
                ("sv".to_string(), "sv_SE-nst-medium.onnx".to_string()),
                ("en".to_string(), "en_US-amy-medium.onnx".to_string()),
            ]),
            temp_dir,
            synth_timeout_ms: 10_000,
        }
    }
}

/// Temporary WAV path, removed when dropped
struct TempWav {
    path: PathBuf,
}

impl TempWav {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("pecs_tts_{}.wav", gen_id())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempWav {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct PiperEngine {
    config: PiperConfig,
    voice_dir: Option<PathBuf>,
    players: Arc<PlayerChain>,
}

impl PiperEngine {
    pub fn new(config: PiperConfig, players: Arc<PlayerChain>) -> Self {
        let voice_dir = config
            .voice_dirs
            .iter()
            .find(|d| !list_models(d).is_empty())
            .cloned();

        if let Some(ref bin) = config.bin {
            info!(target: "tts", bin = ?bin, voice_dir = ?voice_dir, "Detected Piper binary");
        }

        Self {
            config,
            voice_dir,
            players,
        }
    }

    pub fn voice_dir(&self) -> Option<&Path> {
        self.voice_dir.as_deref()
    }

    /// Model for `lang`, honouring a `.onnx` voice override
    pub fn model_for(&self, lang: &str, voice: Option<&str>) -> Option<PathBuf> {
        if let Some(voice) = voice.filter(|v| is_piper_model(v)) {
            let direct = PathBuf::from(voice);
            if direct.is_absolute() && direct.is_file() {
                return Some(direct);
            }
            if let Some(path) = self.voice_dir.as_ref().map(|d| d.join(voice)) {
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        let file = self.config.models.get(&lang.to_lowercase())?;
        let path = self.voice_dir.as_ref()?.join(file);
        path.is_file().then_some(path)
    }

    fn length_scale(speed: f32) -> f32 {
        1.0 / speed.clamp(0.5, 2.0)
    }

    async fn synthesize(
        &self,
        bin: &Path,
        model: &Path,
        utterance: &Utterance,
        wav: &Path,
    ) -> Result<()> {
        let mut cmd = Command::new(bin);
        cmd.arg("--model")
            .arg(model)
            .arg("--output_file")
            .arg(wav)
            .arg("--length_scale")
            .arg(format!("{:.2}", Self::length_scale(utterance.speed)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(target: "tts", id = %utterance.id, model = %model.display(), "Running piper");
        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(utterance.text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = timeout(
            Duration::from_millis(self.config.synth_timeout_ms),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| PecsError::Timeout("piper synthesis".into()))??;

        if !output.status.success() {
            return Err(PecsError::EngineError(format!(
                "piper failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !wav.is_file() {
            return Err(PecsError::EngineError("piper wrote no audio".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for PiperEngine {
    fn name(&self) -> &'static str {
        PIPER
    }

    fn is_available(&self, utterance: &Utterance) -> bool {
        self.config.bin.is_some()
            && self.players.has_available()
            && self
                .model_for(&utterance.lang, utterance.voice.as_deref())
                .is_some()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let bin = self
            .config
            .bin
            .as_ref()
            .ok_or_else(|| PecsError::MissingBinary(PIPER.into()))?;
        let model = self
            .model_for(&utterance.lang, utterance.voice.as_deref())
            .ok_or_else(|| {
                PecsError::EngineError(format!("no Piper voice for '{}'", utterance.lang))
            })?;

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let wav = TempWav::new(&self.config.temp_dir);
        self.synthesize(bin, &model, utterance, wav.path()).await?;

        let player = self.players.play(wav.path()).await?;
        debug!(target: "tts", id = %utterance.id, player = %player, "Piper playback finished");
        Ok(())
    }

    async fn voices(&self, lang: &str) -> Vec<VoiceInfo> {
        let Some(dir) = self.voice_dir.as_ref() else {
            return Vec::new();
        };
        let lang = lang.trim().to_lowercase();
        let prefixes = [format!("{}_", lang), format!("{}-", lang)];
        list_models(dir)
            .into_iter()
            .filter(|file| {
                let lower = file.to_lowercase();
                lang.is_empty() || prefixes.iter().any(|p| lower.starts_with(p.as_str()))
            })
            .map(|file| {
                let language = file.split('-').next().unwrap_or_default().to_string();
                VoiceInfo {
                    engine: PIPER.to_string(),
                    language,
                    description: Some(dir.join(&file).display().to_string()),
                    name: file,
                }
            })
            .collect()
    }

    fn describe(&self) -> Option<String> {
        self.config.bin.as_ref()?;
        let dir = self.voice_dir.as_ref()?;
        Some(format!("Piper ({} voices)", list_models(dir).len()))
    }
}

/// `.onnx` file names in `dir`, sorted
fn list_models(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut models: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| is_piper_model(name))
        .collect();
    models.sort();
    models
}

// =============================================================================
// espeak-ng
// =============================================================================

#[derive(Debug, Clone)]
pub struct EspeakConfig {
    pub bin: Option<PathBuf>,
    /// Words per minute at speed 1.0
    pub base_wpm: u32,
    /// Language code -> default espeak voice
    pub voices: HashMap<String, String>,
    pub timeout_ms: u64,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            bin: get_from_env_or_path("ESPEAK_BIN", "espeak-ng")
                .or_else(|| get_from_path("espeak")),
            base_wpm: 130,
            voices: HashMap::from([
                ("sv".to_string(), "sv".to_string()),
                ("en".to_string(), "en".to_string()),
            ]),
            timeout_ms: 60_000,
        }
    }
}

pub struct EspeakEngine {
    config: EspeakConfig,
}

impl EspeakEngine {
    pub fn new(config: EspeakConfig) -> Self {
        if let Some(ref bin) = config.bin {
            info!(target: "tts", bin = ?bin, "Detected espeak-ng binary");
        }
        Self { config }
    }

    pub fn words_per_minute(&self, speed: f32) -> u32 {
        (self.config.base_wpm as f32 * speed).round().clamp(80.0, 450.0) as u32
    }

    pub fn voice_for(&self, utterance: &Utterance) -> String {
        utterance
            .voice
            .as_deref()
            .filter(|v| !is_piper_model(v))
            .map(str::to_string)
            .or_else(|| self.config.voices.get(&utterance.lang.to_lowercase()).cloned())
            .unwrap_or_else(|| utterance.lang.clone())
    }

    pub fn args(&self, utterance: &Utterance) -> Vec<String> {
        vec![
            "-v".to_string(),
            self.voice_for(utterance),
            "-s".to_string(),
            self.words_per_minute(utterance.speed).to_string(),
            "-p".to_string(),
            utterance.pitch.min(99).to_string(),
            utterance.text.clone(),
        ]
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &'static str {
        ESPEAK
    }

    fn is_available(&self, _utterance: &Utterance) -> bool {
        self.config.bin.is_some()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let bin = self
            .config
            .bin
            .as_ref()
            .ok_or_else(|| PecsError::MissingBinary(ESPEAK.into()))?;

        let mut cmd = Command::new(bin);
        cmd.args(self.args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(target: "tts", id = %utterance.id, voice = %self.voice_for(utterance), "Running espeak-ng");
        let output = timeout(Duration::from_millis(self.config.timeout_ms), cmd.output())
            .await
            .map_err(|_| PecsError::Timeout("espeak-ng".into()))??;

        if !output.status.success() {
            return Err(PecsError::EngineError(format!(
                "espeak-ng failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn voices(&self, lang: &str) -> Vec<VoiceInfo> {
        let Some(bin) = self.config.bin.as_ref() else {
            return Vec::new();
        };
        let mut cmd = Command::new(bin);
        if lang.trim().is_empty() {
            cmd.arg("--voices");
        } else {
            cmd.arg(format!("--voices={}", lang.trim()));
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        match timeout(Duration::from_secs(5), cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                parse_espeak_voices(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(Ok(output)) => {
                debug!(target: "tts", status = %output.status, "espeak-ng --voices failed");
                Vec::new()
            }
            Ok(Err(e)) => {
                debug!(target: "tts", error = %e, "espeak-ng --voices failed");
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }

    fn describe(&self) -> Option<String> {
        self.config.bin.as_ref().map(|_| ESPEAK.to_string())
    }
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  sv              --/M      Swedish            gmw/sv
/// ```
pub fn parse_espeak_voices(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let _age_gender = cols.next()?;
            let voice_name = cols.next()?;
            Some(VoiceInfo {
                engine: ESPEAK.to_string(),
                name: language.to_string(),
                language: language.to_string(),
                description: Some(voice_name.replace('_', " ")),
            })
        })
        .collect()
}
