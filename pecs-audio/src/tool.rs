use crate::dispatcher::SpeechDispatcher;
use async_trait::async_trait;
use pecs_core::tools::{Tool, ToolError, ToolRegistry, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize, Debug, Default)]
struct SpeakPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    wait: bool,
}

/// `tts:speak` backed by the speech dispatcher
pub struct SpeakTool {
    dispatcher: Arc<SpeechDispatcher>,
}

impl SpeakTool {
    pub fn new(dispatcher: Arc<SpeechDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for SpeakTool {
    fn name(&self) -> String {
        "tts:speak".to_string()
    }

    fn description(&self) -> String {
        "Speak text aloud using local TTS engines (Piper, falling back to espeak-ng)".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to speak" },
                "lang": { "type": "string", "description": "Language code (e.g. 'sv', 'en')" },
                "wait": {
                    "type": "boolean",
                    "description": "Wait until speech has finished",
                    "default": false
                }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let payload: SpeakPayload = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if payload.text.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'text'".into()));
        }

        let lang = payload.lang.unwrap_or_default();
        let handle = self.dispatcher.speak(&payload.text, &lang);
        let id = handle.id().to_string();

        if !payload.wait {
            return Ok(json!({ "id": id, "status": "queued" }));
        }

        let outcome = handle.finished().await;
        let mut result = serde_json::to_value(&outcome)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        result["id"] = json!(id);
        Ok(result)
    }
}

pub async fn register_speech_tools(registry: &ToolRegistry, dispatcher: Arc<SpeechDispatcher>) {
    registry.register(Arc::new(SpeakTool::new(dispatcher))).await;
}
