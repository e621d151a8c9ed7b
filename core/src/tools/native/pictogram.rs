use crate::pictogram::{PictogramProvider, SearchMode};
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_LANG: &str = "en";
const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 50;

fn required_str<'a>(arguments: &'a Value, key: &str) -> ToolResult<&'a str> {
    arguments[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{}'", key)))
}

fn lang_arg(arguments: &Value) -> &str {
    arguments["lang"].as_str().unwrap_or(DEFAULT_LANG)
}

/// Candidate pictograms for a term
pub struct PictogramSearchTool {
    provider: Arc<PictogramProvider>,
}

impl PictogramSearchTool {
    pub fn new(provider: Arc<PictogramProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for PictogramSearchTool {
    fn name(&self) -> String {
        "pictogram:search".to_string()
    }

    fn description(&self) -> String {
        "Search ARASAAC pictograms for a word, optionally through the bilingual lexicon".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "term": {
                    "type": "string",
                    "description": "Word or phrase to search for (e.g. 'apple', 'äpple')"
                },
                "lang": {
                    "type": "string",
                    "description": "Language code of the term",
                    "default": DEFAULT_LANG
                },
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": MAX_LIMIT,
                    "default": DEFAULT_LIMIT
                },
                "mode": {
                    "type": "string",
                    "enum": ["direct", "smart"],
                    "default": "direct"
                }
            },
            "required": ["term"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let term = required_str(&arguments, "term")?;
        let lang = lang_arg(&arguments);
        let limit = arguments["limit"]
            .as_u64()
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT) as usize;
        let mode = match arguments["mode"].as_str() {
            Some(m) => m
                .parse::<SearchMode>()
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
            None => SearchMode::Direct,
        };

        debug!(target: "pictogram_tool", term = %term, lang = %lang, limit, mode = ?mode, "Searching pictograms");

        let matches = self
            .provider
            .search_multiple(term, lang, limit, mode)
            .await;

        Ok(json!({
            "term": term,
            "lang": lang,
            "count": matches.len(),
            "results": matches
        }))
    }
}

/// Resolve a term to a cached pictogram image
pub struct PictogramFetchTool {
    provider: Arc<PictogramProvider>,
}

impl PictogramFetchTool {
    pub fn new(provider: Arc<PictogramProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for PictogramFetchTool {
    fn name(&self) -> String {
        "pictogram:fetch".to_string()
    }

    fn description(&self) -> String {
        "Download (or reuse) the pictogram image for a word and return its local path".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "term": {
                    "type": "string",
                    "description": "Word or phrase to look up"
                },
                "lang": {
                    "type": "string",
                    "description": "Language code of the term",
                    "default": DEFAULT_LANG
                },
                "resolution": {
                    "type": "integer",
                    "description": "Requested size in pixels; snapped to a supported size"
                }
            },
            "required": ["term"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let term = required_str(&arguments, "term")?;
        let lang = lang_arg(&arguments);
        let resolution = match arguments["resolution"].as_u64() {
            Some(r) => u32::try_from(r).map_err(|_| {
                ToolError::InvalidArguments(format!("resolution out of range: {}", r))
            })?,
            None => self.provider.config().default_resolution,
        };

        let id = self
            .provider
            .search(term, lang)
            .await
            .ok_or_else(|| ToolError::NotFound(format!("No pictogram for '{}'", term)))?;

        let path = self
            .provider
            .get_image_path(id, resolution)
            .await
            .ok_or_else(|| {
                ToolError::ExecutionFailed(format!("Could not download pictogram {}", id))
            })?;

        Ok(json!({
            "term": term,
            "lang": lang,
            "id": id,
            "path": path.display().to_string()
        }))
    }
}
