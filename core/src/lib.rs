// PECS Core Library
// Pictogram lookup, board vocabulary and tool surface for a communication board

pub mod board;
pub mod lexicon;
pub mod pictogram;
pub mod telemetry;
pub mod tools;
pub(crate) mod utils;

// Export core types
pub use board::{Card, CardFace, Category, Sentence};
pub use lexicon::Lexicon;
pub use pictogram::{
    ArasaacClient, ArasaacConfig, PictogramConfig, PictogramMatch, PictogramProvider,
    PictogramRecord, PictogramSource, SearchMode,
};
pub use telemetry::{ProviderStats, ProviderStatsSnapshot};
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult};

use std::sync::Arc;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PecsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Missing binary: {0}")]
    MissingBinary(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Lexicon error: {0}")]
    LexiconError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PecsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PecsError::Timeout(e.to_string())
        } else if e.is_decode() {
            PecsError::MalformedResponse(e.to_string())
        } else {
            PecsError::NetworkError(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, PecsError>;

/// Core runtime: the pictogram provider plus the tools that expose it
pub struct PecsRuntime {
    pub provider: Arc<PictogramProvider>,
    pub tool_registry: Arc<ToolRegistry>,
}

impl PecsRuntime {
    pub async fn new(config: PictogramConfig, arasaac: ArasaacConfig) -> Result<Self> {
        let source = Arc::new(ArasaacClient::new(arasaac)?);
        let provider = Arc::new(PictogramProvider::with_parts(
            config,
            source,
            Lexicon::bundled(),
        ));
        Ok(Self::from_provider(provider).await)
    }

    /// Build a runtime around an existing provider and register the pictogram tools
    pub async fn from_provider(provider: Arc<PictogramProvider>) -> Self {
        let tool_registry = Arc::new(ToolRegistry::new());
        tools::native::register_pictogram_tools(&tool_registry, Arc::clone(&provider)).await;

        tracing::info!(
            target: "pecs",
            cache_dir = %provider.config().cache_dir.display(),
            tools = tool_registry.len(),
            "PECS runtime ready"
        );

        Self {
            provider,
            tool_registry,
        }
    }
}
