use crate::utils::gen_id;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SEARCH_CACHE_FILE: &str = "search_cache.json";
pub const RESULTS_CACHE_FILE: &str = "search_results_cache.json";

/// Trim, lowercase and collapse inner whitespace
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Language codes are matched case-insensitively: `" SV "` is `"sv"`
pub fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase()
}

/// Cache key for a (language, term) pair: `"{lang}:{term}"`
pub fn cache_key(lang: &str, term: &str) -> String {
    format!("{}:{}", normalize_lang(lang), normalize_term(term))
}

/// Write `bytes` next to `path` and rename into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("{}.part", gen_id()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// A flat string-keyed JSON object mirrored in memory.
///
/// The file is read on first access and rewritten after every insert.
/// Read and write failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct JsonFileCache<V> {
    path: Option<PathBuf>,
    entries: HashMap<String, V>,
    loaded: bool,
}

impl<V> JsonFileCache<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            entries: HashMap::new(),
            loaded: false,
        }
    }

    /// A cache that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
            loaded: true,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let Some(path) = self.path.as_ref() else {
            return;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(data) => match serde_json::from_str::<HashMap<String, V>>(&data) {
                Ok(entries) => {
                    debug!(target: "pictogram", path = %path.display(), entries = entries.len(), "Loaded cache file");
                    self.entries = entries;
                }
                Err(e) => {
                    warn!(target: "pictogram", path = %path.display(), error = %e, "Ignoring unreadable cache file");
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(target: "pictogram", path = %path.display(), error = %e, "Failed to read cache file");
            }
        }
    }

    pub async fn get(&mut self, key: &str) -> Option<&V> {
        self.ensure_loaded().await;
        self.entries.get(key)
    }

    pub async fn contains_key(&mut self, key: &str) -> bool {
        self.ensure_loaded().await;
        self.entries.contains_key(key)
    }

    /// Insert and persist; a failed write keeps the in-memory entry
    pub async fn insert(&mut self, key: String, value: V) {
        self.ensure_loaded().await;
        self.entries.insert(key, value);
        if let Err(e) = self.persist().await {
            warn!(target: "pictogram", error = %e, "Failed to persist cache file");
        }
    }

    pub async fn len(&mut self) -> usize {
        self.ensure_loaded().await;
        self.entries.len()
    }

    pub async fn is_empty(&mut self) -> bool {
        self.len().await == 0
    }

    /// Drop all in-memory entries without touching the file
    pub fn reset(&mut self) {
        self.entries.clear();
        self.loaded = true;
    }

    pub async fn persist(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let data = serde_json::to_vec(&self.entries)?;
        write_atomic(path, &data).await?;
        Ok(())
    }
}

/// Directory of downloaded images named `{id}_{resolution}.png`.
///
/// A file's existence is the only cache-hit signal.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(id: u64, resolution: u32) -> String {
        format!("{}_{}.png", id, resolution)
    }

    pub fn path_for(&self, id: u64, resolution: u32) -> PathBuf {
        self.dir.join(Self::file_name(id, resolution))
    }

    pub fn lookup(&self, id: u64, resolution: u32) -> Option<PathBuf> {
        let path = self.path_for(id, resolution);
        path.is_file().then_some(path)
    }

    pub async fn store(&self, id: u64, resolution: u32, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(id, resolution);
        let tmp = self
            .dir
            .join(format!(".{}.{}.part", Self::file_name(id, resolution), gen_id()));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(path)
    }

    fn files(&self) -> Vec<std::fs::DirEntry> {
        match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Total bytes of regular files in the cache directory
    pub fn size_bytes(&self) -> u64 {
        self.files()
            .iter()
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }

    /// Delete every regular file in the cache directory; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for entry in self.files() {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(target: "pictogram", path = %entry.path().display(), error = %e, "Failed to remove cached file");
                }
            }
        }
        removed
    }
}
