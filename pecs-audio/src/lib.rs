// Speech output for the PECS board: engines, players and the dispatcher

pub mod dispatcher;
pub mod engine;
pub mod player;
pub mod settings;
pub mod tool;

// Shared audio utilities
pub(crate) mod utils;

pub use dispatcher::{
    DispatcherConfig, OverlapPolicy, SpeechDispatcher, SpeechEvent, SpeechHandle, SpeechOutcome,
    TtsInfo,
};
pub use engine::{
    EspeakConfig, EspeakEngine, PiperConfig, PiperEngine, SpeechEngine, Utterance, VoiceInfo,
};
pub use player::{AudioPlayer, CommandPlayer, PlayerChain};
pub use settings::{EngineChoice, SettingsPatch, SharedSettings, TtsSettings};
pub use tool::{register_speech_tools, SpeakTool};
