//! WAV playback through whichever command-line player is installed

use crate::utils::{bin_name, get_from_path};
use async_trait::async_trait;
use pecs_core::{PecsError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Players tried in order, with their extra arguments
const DEFAULT_PLAYERS: &[(&str, &[&str])] = &[
    ("aplay", &[]),
    ("paplay", &[]),
    ("pw-play", &[]),
    ("ffplay", &["-nodisp", "-autoexit"]),
];

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Play `wav` to completion. Dropping the future stops playback.
    async fn play(&self, wav: &Path) -> Result<()>;
}

/// A player binary invoked as `<bin> [args..] <file>`
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    name: String,
    bin: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandPlayer {
    /// Look `name` up on PATH
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            bin: get_from_path(name),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn with_bin(bin: PathBuf, args: &[&str]) -> Self {
        Self {
            name: bin_name(&bin).to_string(),
            bin: Some(bin),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn bin(&self) -> Option<&Path> {
        self.bin.as_deref()
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.bin.is_some()
    }

    async fn play(&self, wav: &Path) -> Result<()> {
        let bin = self
            .bin
            .as_ref()
            .ok_or_else(|| PecsError::MissingBinary(self.name.clone()))?;

        let mut cmd = Command::new(bin);
        cmd.args(&self.args)
            .arg(wav)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(target: "tts", player = %self.name, path = %wav.display(), "Playing WAV");
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(PecsError::EngineError(format!(
                "{} failed: {}",
                self.name,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Ordered players; the first one that plays the file wins
#[derive(Clone, Default)]
pub struct PlayerChain {
    players: Vec<Arc<dyn AudioPlayer>>,
}

impl PlayerChain {
    pub fn new(players: Vec<Arc<dyn AudioPlayer>>) -> Self {
        Self { players }
    }

    /// aplay, paplay, pw-play, ffplay as found on PATH
    pub fn detect_default() -> Self {
        let players = DEFAULT_PLAYERS
            .iter()
            .map(|(name, args)| Arc::new(CommandPlayer::new(name, args)) as Arc<dyn AudioPlayer>)
            .collect();
        Self { players }
    }

    pub fn has_available(&self) -> bool {
        self.players.iter().any(|p| p.is_available())
    }

    pub fn available_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Play with the first available player, moving on when one fails.
    /// Returns the name of the player that succeeded.
    pub async fn play(&self, wav: &Path) -> Result<String> {
        for player in self.players.iter().filter(|p| p.is_available()) {
            match player.play(wav).await {
                Ok(()) => return Ok(player.name().to_string()),
                Err(e) => {
                    warn!(target: "tts", player = %player.name(), error = %e, "Audio player failed; trying next");
                }
            }
        }
        Err(PecsError::MissingBinary("no working audio player".into()))
    }
}
