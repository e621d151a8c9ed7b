//! Background speech dispatcher
//!
//! `speak` never blocks: it hands the utterance to a single worker task and
//! returns a [`SpeechHandle`]. The worker resolves settings, then walks the
//! engine chain until one engine speaks. Exhausting the chain is logged and
//! reported as [`SpeechOutcome::Silent`], never as an error.
//!
//! Events are broadcast for observers:
//! - `Started`, `EngineFailed`, `Finished`

use crate::engine::{
    EspeakConfig, EspeakEngine, PiperConfig, PiperEngine, SpeechEngine, Utterance, VoiceInfo,
};
use crate::player::PlayerChain;
use crate::settings::{EngineChoice, SettingsPatch, SharedSettings};
use crate::utils::{gen_id, now_ms};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happens when `speak` is called while something is still speaking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Stop the current utterance and drop anything queued
    #[default]
    Interrupt,
    /// Speak requests one after another
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub overlap: OverlapPolicy,
    /// Used when `speak` is given an empty language
    pub default_lang: String,
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapPolicy::Interrupt,
            default_lang: "sv".to_string(),
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeechOutcome {
    Spoken { engine: String },
    /// No engine could speak
    Silent,
    Cancelled,
    /// Nothing to say
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpeechEvent {
    Started {
        id: String,
        lang: String,
        timestamp_ms: i64,
    },
    EngineFailed {
        id: String,
        engine: String,
        error: String,
    },
    Finished {
        id: String,
        outcome: SpeechOutcome,
        elapsed_ms: i64,
    },
}

/// Engines found on this machine, for status lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TtsInfo {
    pub engines: Vec<String>,
}

impl TtsInfo {
    pub fn is_available(&self) -> bool {
        !self.engines.is_empty()
    }
}

impl fmt::Display for TtsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.engines.is_empty() {
            write!(f, "No TTS available")
        } else {
            write!(f, "{}", self.engines.join(", "))
        }
    }
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// One-shot cancellation signal shared between a handle and the worker
#[derive(Clone, Default)]
pub(crate) struct CancelFlag(Arc<CancelInner>);

impl CancelFlag {
    fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        loop {
            // register before checking so a concurrent cancel is not missed
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

struct Job {
    id: String,
    text: String,
    lang: String,
    own: CancelFlag,
    epoch: CancelFlag,
    done: oneshot::Sender<SpeechOutcome>,
}

impl Job {
    fn is_cancelled(&self) -> bool {
        self.own.is_cancelled() || self.epoch.is_cancelled()
    }

    async fn cancelled(&self) {
        tokio::select! {
            _ = self.own.cancelled() => {}
            _ = self.epoch.cancelled() => {}
        }
    }
}

/// Returned by [`SpeechDispatcher::speak`]
pub struct SpeechHandle {
    id: String,
    cancel: CancelFlag,
    done: oneshot::Receiver<SpeechOutcome>,
}

impl SpeechHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop this utterance, or drop it if it has not started
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the utterance to end
    pub async fn finished(self) -> SpeechOutcome {
        self.done.await.unwrap_or(SpeechOutcome::Cancelled)
    }
}

#[derive(Clone)]
struct EngineSet {
    piper: Arc<dyn SpeechEngine>,
    espeak: Arc<dyn SpeechEngine>,
}

impl EngineSet {
    fn chain(&self, choice: EngineChoice) -> Vec<Arc<dyn SpeechEngine>> {
        match choice {
            EngineChoice::Auto | EngineChoice::Piper => {
                vec![Arc::clone(&self.piper), Arc::clone(&self.espeak)]
            }
            EngineChoice::Espeak => vec![Arc::clone(&self.espeak)],
        }
    }

    fn all(&self) -> [&Arc<dyn SpeechEngine>; 2] {
        [&self.piper, &self.espeak]
    }
}

pub struct SpeechDispatcher {
    settings: SharedSettings,
    config: DispatcherConfig,
    engines: EngineSet,
    jobs: mpsc::UnboundedSender<Job>,
    epoch: Mutex<CancelFlag>,
    events: broadcast::Sender<SpeechEvent>,
    worker: JoinHandle<()>,
}

impl SpeechDispatcher {
    /// Dispatcher over Piper and espeak-ng as installed on this machine.
    /// Must be called inside a Tokio runtime.
    pub fn new(settings: SharedSettings, config: DispatcherConfig) -> Self {
        let players = Arc::new(PlayerChain::detect_default());
        let piper = Arc::new(PiperEngine::new(PiperConfig::default(), players));
        let espeak = Arc::new(EspeakEngine::new(EspeakConfig::default()));
        Self::with_engines(settings, config, piper, espeak)
    }

    /// Dispatcher over explicit engines; `primary` plays Piper's role
    pub fn with_engines(
        settings: SharedSettings,
        config: DispatcherConfig,
        primary: Arc<dyn SpeechEngine>,
        fallback: Arc<dyn SpeechEngine>,
    ) -> Self {
        let engines = EngineSet {
            piper: primary,
            espeak: fallback,
        };
        let (jobs, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let worker = tokio::spawn(run_worker(
            rx,
            engines.clone(),
            Arc::clone(&settings),
            events.clone(),
        ));

        info!(
            target: "tts",
            overlap = ?config.overlap,
            primary = engines.piper.name(),
            fallback = engines.espeak.name(),
            "Speech dispatcher started"
        );

        Self {
            settings,
            config,
            engines,
            jobs,
            epoch: Mutex::new(CancelFlag::default()),
            events,
            worker,
        }
    }

    pub fn settings(&self) -> SharedSettings {
        Arc::clone(&self.settings)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Merge `patch` into the shared settings; applies from the next utterance
    pub async fn configure(&self, patch: SettingsPatch) {
        let mut settings = self.settings.write().await;
        settings.apply(patch);
        debug!(
            target: "tts",
            engine = ?settings.engine,
            speed = settings.speed,
            pitch = settings.pitch,
            "Speech settings updated"
        );
    }

    /// Replace the shared epoch, cancelling everything issued under the old one
    fn next_epoch(&self) -> CancelFlag {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = CancelFlag::default();
        let old = std::mem::replace(&mut *epoch, fresh.clone());
        old.cancel();
        fresh
    }

    fn current_epoch(&self) -> CancelFlag {
        self.epoch.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Queue `text` for speaking in `lang`
    pub fn speak(&self, text: &str, lang: &str) -> SpeechHandle {
        let id = gen_id();
        let own = CancelFlag::default();
        let (done, rx) = oneshot::channel();
        let handle = SpeechHandle {
            id: id.clone(),
            cancel: own.clone(),
            done: rx,
        };

        let text = text.trim();
        if text.is_empty() {
            let _ = done.send(SpeechOutcome::Skipped);
            return handle;
        }

        let lang = match lang.trim() {
            "" => self.config.default_lang.clone(),
            l => l.to_lowercase(),
        };

        let epoch = match self.config.overlap {
            OverlapPolicy::Interrupt => self.next_epoch(),
            OverlapPolicy::Queue => self.current_epoch(),
        };

        let job = Job {
            id,
            text: text.to_string(),
            lang,
            own,
            epoch,
            done,
        };
        if self.jobs.send(job).is_err() {
            warn!(target: "tts", "Speech worker is gone; dropping utterance");
        }
        handle
    }

    /// Stop the current utterance and drop everything queued
    pub fn cancel_all(&self) {
        self.next_epoch();
    }

    pub async fn get_available_voices(&self, lang: &str) -> Vec<VoiceInfo> {
        let mut voices = Vec::new();
        for engine in self.engines.all() {
            voices.extend(engine.voices(lang).await);
        }
        voices
    }

    pub fn get_tts_info(&self) -> TtsInfo {
        TtsInfo {
            engines: self
                .engines
                .all()
                .iter()
                .filter_map(|e| e.describe())
                .collect(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    engines: EngineSet,
    settings: SharedSettings,
    events: broadcast::Sender<SpeechEvent>,
) {
    while let Some(job) = jobs.recv().await {
        if job.is_cancelled() {
            debug!(target: "tts", id = %job.id, "Dropping cancelled utterance");
            let _ = job.done.send(SpeechOutcome::Cancelled);
            continue;
        }

        let started = now_ms();
        let snapshot = settings.read().await.clone();
        let utterance = Utterance {
            id: job.id.clone(),
            text: job.text.clone(),
            lang: job.lang.clone(),
            speed: snapshot.speed,
            pitch: snapshot.pitch,
            voice: snapshot.voice_for(&job.lang).map(str::to_string),
        };
        let chain = engines.chain(snapshot.engine);

        let _ = events.send(SpeechEvent::Started {
            id: job.id.clone(),
            lang: job.lang.clone(),
            timestamp_ms: started,
        });

        let outcome = tokio::select! {
            biased;
            _ = job.cancelled() => SpeechOutcome::Cancelled,
            spoken = speak_with_chain(&chain, snapshot.engine, &utterance, &events) => match spoken {
                Some(engine) => SpeechOutcome::Spoken { engine: engine.to_string() },
                None => SpeechOutcome::Silent,
            },
        };

        let elapsed_ms = now_ms() - started;
        debug!(target: "tts", id = %job.id, outcome = ?outcome, elapsed_ms, "Utterance finished");
        let _ = events.send(SpeechEvent::Finished {
            id: job.id.clone(),
            outcome: outcome.clone(),
            elapsed_ms,
        });
        let _ = job.done.send(outcome);
    }
}

/// First engine that speaks wins; returns its name
async fn speak_with_chain(
    chain: &[Arc<dyn SpeechEngine>],
    choice: EngineChoice,
    utterance: &Utterance,
    events: &broadcast::Sender<SpeechEvent>,
) -> Option<&'static str> {
    for engine in chain {
        if !engine.is_available(utterance) {
            if choice == EngineChoice::Piper && engine.name() == chain[0].name() {
                warn!(target: "tts", engine = engine.name(), lang = %utterance.lang, "Preferred engine unavailable; falling back");
            } else {
                debug!(target: "tts", engine = engine.name(), lang = %utterance.lang, "Engine unavailable");
            }
            continue;
        }

        match engine.speak(utterance).await {
            Ok(()) => return Some(engine.name()),
            Err(e) => {
                warn!(target: "tts", engine = engine.name(), id = %utterance.id, error = %e, "Speech engine failed");
                let _ = events.send(SpeechEvent::EngineFailed {
                    id: utterance.id.clone(),
                    engine: engine.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    warn!(target: "tts", id = %utterance.id, lang = %utterance.lang, "No speech engine could speak");
    None
}
