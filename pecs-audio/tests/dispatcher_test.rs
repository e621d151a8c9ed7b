//! Speech dispatcher behaviour with in-process engines
//!
//! `FakeEngine` records what it was asked to say; utterances containing
//! "long" block until cancelled.

use async_trait::async_trait;
use pecs_audio::settings::shared;
use pecs_audio::{
    register_speech_tools, DispatcherConfig, EngineChoice, OverlapPolicy, SettingsPatch,
    SpeechDispatcher, SpeechEngine, SpeechEvent, SpeechOutcome, TtsSettings, Utterance, VoiceInfo,
};
use pecs_core::{PecsError, Result, ToolError, ToolRegistry};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};

// =============================================================================
// Fake engine
// =============================================================================

struct FakeEngine {
    name: &'static str,
    available: bool,
    fails: bool,
    calls: AtomicUsize,
    spoken: Mutex<Vec<Utterance>>,
}

impl FakeEngine {
    fn new(name: &'static str, available: bool, fails: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            available,
            fails,
            calls: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    fn last(&self) -> Option<Utterance> {
        self.spoken.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self, _utterance: &Utterance) -> bool {
        self.available
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(PecsError::EngineError("synthesis crashed".into()));
        }
        if utterance.text.contains("long") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.spoken.lock().unwrap().push(utterance.clone());
        Ok(())
    }

    async fn voices(&self, lang: &str) -> Vec<VoiceInfo> {
        vec![VoiceInfo {
            engine: self.name.to_string(),
            name: format!("{}-{}", self.name, lang),
            language: lang.to_string(),
            description: None,
        }]
    }

    fn describe(&self) -> Option<String> {
        self.available.then(|| self.name.to_string())
    }
}

fn dispatcher(
    primary: &Arc<FakeEngine>,
    fallback: &Arc<FakeEngine>,
    overlap: OverlapPolicy,
) -> SpeechDispatcher {
    SpeechDispatcher::with_engines(
        shared(TtsSettings::default()),
        DispatcherConfig {
            overlap,
            ..DispatcherConfig::default()
        },
        primary.clone(),
        fallback.clone(),
    )
}

async fn outcome(handle: pecs_audio::SpeechHandle) -> SpeechOutcome {
    timeout(Duration::from_secs(5), handle.finished())
        .await
        .expect("utterance did not finish")
}

fn spoken(engine: &str) -> SpeechOutcome {
    SpeechOutcome::Spoken {
        engine: engine.to_string(),
    }
}

// =============================================================================
// Engine chain
// =============================================================================

#[tokio::test]
async fn test_primary_engine_speaks() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    let result = outcome(dispatcher.speak("Hej!", "sv")).await;
    assert_eq!(result, spoken("piper"));
    assert_eq!(espeak.calls(), 0);
    assert_eq!(piper.last().unwrap().lang, "sv");
}

#[tokio::test]
async fn test_falls_back_when_primary_fails() {
    let piper = FakeEngine::new("piper", true, true);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);
    let mut events = dispatcher.subscribe();

    let result = outcome(dispatcher.speak("Hello", "en")).await;
    assert_eq!(result, spoken("espeak-ng"));
    assert_eq!(piper.calls(), 1);
    assert_eq!(espeak.texts(), vec!["Hello"]);

    assert!(matches!(events.recv().await.unwrap(), SpeechEvent::Started { .. }));
    match events.recv().await.unwrap() {
        SpeechEvent::EngineFailed { engine, .. } => assert_eq!(engine, "piper"),
        other => panic!("unexpected event: {:?}", other),
    }
    match events.recv().await.unwrap() {
        SpeechEvent::Finished { outcome, .. } => assert_eq!(outcome, spoken("espeak-ng")),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_no_engines_is_silent() {
    let piper = FakeEngine::new("piper", false, false);
    let espeak = FakeEngine::new("espeak-ng", false, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    let started = std::time::Instant::now();
    let handle = dispatcher.speak("Hej", "sv");
    assert!(started.elapsed() < Duration::from_millis(100));

    assert_eq!(outcome(handle).await, SpeechOutcome::Silent);
    assert_eq!(piper.calls() + espeak.calls(), 0);
    assert_eq!(dispatcher.get_tts_info().to_string(), "No TTS available");
}

#[tokio::test]
async fn test_espeak_choice_skips_piper() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    dispatcher
        .configure(SettingsPatch {
            engine: Some(EngineChoice::Espeak),
            ..Default::default()
        })
        .await;

    assert_eq!(outcome(dispatcher.speak("Tack", "sv")).await, spoken("espeak-ng"));
    assert_eq!(piper.calls(), 0);
}

#[tokio::test]
async fn test_empty_text_is_skipped() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    assert_eq!(outcome(dispatcher.speak("   ", "sv")).await, SpeechOutcome::Skipped);
    assert_eq!(piper.calls(), 0);
}

#[tokio::test]
async fn test_configure_applies_to_next_utterance() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    dispatcher
        .configure(SettingsPatch {
            speed: Some(3.0),
            pitch: Some(70),
            voices: [("sv".to_string(), "sv+f3".to_string())].into(),
            ..Default::default()
        })
        .await;

    outcome(dispatcher.speak("Hej", "SV")).await;
    let utterance = piper.last().unwrap();
    assert_eq!(utterance.speed, 2.0);
    assert_eq!(utterance.pitch, 70);
    assert_eq!(utterance.voice.as_deref(), Some("sv+f3"));
    assert_eq!(dispatcher.settings().read().await.speed, 2.0);
}

#[tokio::test]
async fn test_empty_lang_uses_default() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    outcome(dispatcher.speak("Hej", "")).await;
    assert_eq!(piper.last().unwrap().lang, "sv");
}

// =============================================================================
// Overlap and cancellation
// =============================================================================

#[tokio::test]
async fn test_interrupt_cancels_in_flight_utterance() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);
    let mut events = dispatcher.subscribe();

    let first = dispatcher.speak("a long story", "en");
    // wait until the worker has picked it up
    assert!(matches!(events.recv().await.unwrap(), SpeechEvent::Started { .. }));

    let second = dispatcher.speak("stop", "en");
    assert_eq!(outcome(first).await, SpeechOutcome::Cancelled);
    assert_eq!(outcome(second).await, spoken("piper"));
    assert_eq!(piper.texts(), vec!["stop"]);
}

#[tokio::test]
async fn test_interrupt_drops_queued_utterances() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    let first = dispatcher.speak("one", "en");
    let second = dispatcher.speak("two", "en");
    let third = dispatcher.speak("three", "en");

    assert_eq!(outcome(first).await, SpeechOutcome::Cancelled);
    assert_eq!(outcome(second).await, SpeechOutcome::Cancelled);
    assert_eq!(outcome(third).await, spoken("piper"));
}

#[tokio::test]
async fn test_queue_speaks_in_order() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Queue);

    let handles: Vec<_> = ["one", "two", "three"]
        .iter()
        .map(|t| dispatcher.speak(t, "en"))
        .collect();
    for handle in handles {
        assert_eq!(outcome(handle).await, spoken("piper"));
    }
    assert_eq!(piper.texts(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_handle_cancel_stops_utterance() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Queue);
    let mut events = dispatcher.subscribe();

    let handle = dispatcher.speak("a long story", "en");
    assert!(matches!(events.recv().await.unwrap(), SpeechEvent::Started { .. }));

    handle.cancel();
    assert_eq!(outcome(handle).await, SpeechOutcome::Cancelled);

    // the worker is free again
    assert_eq!(outcome(dispatcher.speak("next", "en")).await, spoken("piper"));
}

#[tokio::test]
async fn test_cancel_all_under_queue() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Queue);

    let first = dispatcher.speak("a long story", "en");
    let second = dispatcher.speak("queued", "en");
    dispatcher.cancel_all();

    assert_eq!(outcome(first).await, SpeechOutcome::Cancelled);
    assert_eq!(outcome(second).await, SpeechOutcome::Cancelled);
    assert_eq!(outcome(dispatcher.speak("after", "en")).await, spoken("piper"));
    assert_eq!(piper.texts(), vec!["after"]);
}

// =============================================================================
// Voices, info and the tool
// =============================================================================

#[tokio::test]
async fn test_voices_and_info_cover_both_engines() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = dispatcher(&piper, &espeak, OverlapPolicy::Interrupt);

    let voices = dispatcher.get_available_voices("sv").await;
    let names: Vec<_> = voices.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["piper-sv", "espeak-ng-sv"]);
    assert_eq!(dispatcher.get_tts_info().to_string(), "piper, espeak-ng");
}

#[tokio::test]
async fn test_speak_tool_waits_for_outcome() {
    let piper = FakeEngine::new("piper", false, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = Arc::new(dispatcher(&piper, &espeak, OverlapPolicy::Interrupt));

    let registry = ToolRegistry::new();
    register_speech_tools(&registry, Arc::clone(&dispatcher)).await;

    let result = registry
        .call("tts:speak", json!({"text": "Hej", "lang": "sv", "wait": true}))
        .await
        .unwrap();
    assert_eq!(result["status"], "spoken");
    assert_eq!(result["engine"], "espeak-ng");
    assert!(result["id"].is_string());

    let queued = registry
        .call("tts:speak", json!({"text": "Hej igen"}))
        .await
        .unwrap();
    assert_eq!(queued["status"], "queued");
}

#[tokio::test]
async fn test_speak_tool_rejects_blank_text() {
    let piper = FakeEngine::new("piper", true, false);
    let espeak = FakeEngine::new("espeak-ng", true, false);
    let dispatcher = Arc::new(dispatcher(&piper, &espeak, OverlapPolicy::Queue));

    let registry = ToolRegistry::new();
    register_speech_tools(&registry, Arc::clone(&dispatcher)).await;

    for args in [json!({"text": "   "}), json!({"lang": "sv"})] {
        let result = registry.call("tts:speak", args).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    // nothing reached the engines
    let outcome = dispatcher.speak("Hej", "sv").finished().await;
    assert_eq!(
        outcome,
        SpeechOutcome::Spoken {
            engine: "piper".into()
        }
    );
    assert_eq!(piper.texts(), vec!["Hej"]);
    assert_eq!(espeak.calls(), 0);
}
