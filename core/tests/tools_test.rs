//! Tool registry and the pictogram tools

use async_trait::async_trait;
use pecs_core::pictogram::{PictogramConfig, PictogramProvider};
use pecs_core::tools::native::register_pictogram_tools;
use pecs_core::{
    Lexicon, PecsRuntime, PictogramRecord, PictogramSource, Result, Tool, ToolError, ToolRegistry,
    ToolResult,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct StaticSource;

#[async_trait]
impl PictogramSource for StaticSource {
    async fn search(&self, lang: &str, term: &str) -> Result<Vec<PictogramRecord>> {
        Ok(match (lang, term) {
            ("en", "apple") => vec![
                PictogramRecord::new(2462, &["apple"]),
                PictogramRecord::new(2463, &["apple", "fruit"]),
            ],
            _ => Vec::new(),
        })
    }

    async fn fetch_image(&self, id: u64, _resolution: u32) -> Result<Vec<u8>> {
        Ok(id.to_string().into_bytes())
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> String {
        "test:slow".to_string()
    }

    fn description(&self) -> String {
        "Never finishes in time".to_string()
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!({}))
    }
}

fn provider(dir: &Path) -> Arc<PictogramProvider> {
    Arc::new(PictogramProvider::with_parts(
        PictogramConfig {
            cache_dir: dir.to_path_buf(),
            ..PictogramConfig::default()
        },
        Arc::new(StaticSource),
        Lexicon::bundled(),
    ))
}

#[tokio::test]
async fn test_runtime_registers_pictogram_tools() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = PecsRuntime::from_provider(provider(dir.path())).await;

    let names: Vec<String> = runtime
        .tool_registry
        .list_tools()
        .iter()
        .map(|t| t.name())
        .collect();
    assert_eq!(names, vec!["pictogram:fetch", "pictogram:search"]);

    for tool in runtime.tool_registry.list_tools() {
        let schema = tool.parameters();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["term"]));
    }
}

#[tokio::test]
async fn test_search_tool_smart_mode() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::new();
    register_pictogram_tools(&registry, provider(dir.path())).await;

    let result = registry
        .call(
            "pictogram:search",
            json!({"term": "Äpple", "lang": "sv", "limit": 1, "mode": "smart"}),
        )
        .await
        .unwrap();

    assert_eq!(result["count"], 1);
    assert_eq!(result["results"][0]["id"], 2462);
    assert_eq!(result["results"][0]["label"], "Äpple");
    assert_eq!(result["results"][0]["origin"], "translated");
}

#[tokio::test]
async fn test_search_tool_rejects_bad_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::new();
    register_pictogram_tools(&registry, provider(dir.path())).await;

    let missing = registry.call("pictogram:search", json!({})).await;
    assert!(matches!(missing, Err(ToolError::InvalidArguments(_))));

    let bad_mode = registry
        .call("pictogram:search", json!({"term": "apple", "mode": "fuzzy"}))
        .await;
    assert!(matches!(bad_mode, Err(ToolError::InvalidArguments(_))));
}

#[tokio::test]
async fn test_fetch_tool_returns_cached_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::new();
    register_pictogram_tools(&registry, provider(dir.path())).await;

    let result = registry
        .call("pictogram:fetch", json!({"term": "apple", "resolution": 450}))
        .await
        .unwrap();

    assert_eq!(result["id"], 2462);
    let path = result["path"].as_str().unwrap();
    assert!(path.ends_with("2462_500.png"));
    assert!(Path::new(path).is_file());

    let missing = registry
        .call("pictogram:fetch", json!({"term": "nothing here"}))
        .await;
    assert!(matches!(missing, Err(ToolError::NotFound(_))));
}

#[tokio::test]
async fn test_registry_unknown_tool_and_timeout() {
    let registry = ToolRegistry::with_timeout(Duration::from_millis(50));
    registry.register(Arc::new(SlowTool)).await;

    let unknown = registry.call("nope", json!({})).await;
    assert!(matches!(unknown, Err(ToolError::NotFound(_))));

    let slow = registry.call("test:slow", json!({})).await;
    assert!(matches!(slow, Err(ToolError::Timeout)));
}
