use super::cache::{
    cache_key, normalize_lang, normalize_term, ImageCache, JsonFileCache, RESULTS_CACHE_FILE,
    SEARCH_CACHE_FILE,
};
use super::resolution::{snap_resolution, DEFAULT_RESOLUTIONS};
use super::source::{ArasaacClient, ArasaacConfig, PictogramRecord, PictogramSource};
use crate::lexicon::Lexicon;
use crate::telemetry::{ProviderStats, ProviderStatsSnapshot};
use crate::{PecsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Configuration for the pictogram provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictogramConfig {
    /// Directory holding the JSON caches and downloaded images
    pub cache_dir: PathBuf,
    /// Supported image resolutions
    pub resolutions: Vec<u32>,
    /// Resolution used when the caller has no preference
    pub default_resolution: u32,
    /// Remember terms the endpoint confirmed it has no pictogram for
    pub cache_misses: bool,
}

impl Default for PictogramConfig {
    fn default() -> Self {
        let cache_dir = std::env::var("PECS_CACHE_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|d| d.join("arasaac")))
            .unwrap_or_else(|| std::env::temp_dir().join("arasaac"));

        Self {
            cache_dir,
            resolutions: DEFAULT_RESOLUTIONS.to_vec(),
            default_resolution: 300,
            cache_misses: true,
        }
    }
}

/// How `search_multiple` gathers candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Only the requested language
    #[default]
    Direct,
    /// Requested language first, then the lexicon translation
    Smart,
}

impl FromStr for SearchMode {
    type Err = PecsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(SearchMode::Direct),
            "smart" => Ok(SearchMode::Smart),
            other => Err(PecsError::ConfigError(format!(
                "unknown search mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    Direct,
    Translated,
}

/// A candidate pictogram returned by `search_multiple`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictogramMatch {
    pub id: u64,
    pub keywords: Vec<String>,
    /// Original search term, set on results found through a translation
    pub label: Option<String>,
    pub origin: MatchOrigin,
}

/// Cache-first pictogram lookup.
///
/// Lookups never fail: every error is logged and turned into `None` or an
/// empty result. The provider owns its cache files; share it behind an `Arc`.
pub struct PictogramProvider {
    config: PictogramConfig,
    source: Arc<dyn PictogramSource>,
    lexicon: Arc<Lexicon>,
    search_cache: Mutex<JsonFileCache<Option<u64>>>,
    results_cache: Mutex<JsonFileCache<Vec<PictogramRecord>>>,
    images: ImageCache,
    stats: ProviderStats,
}

impl PictogramProvider {
    /// Provider backed by the ARASAAC API and the bundled lexicon
    pub fn new(config: PictogramConfig) -> Result<Self> {
        let source = Arc::new(ArasaacClient::new(ArasaacConfig::default())?);
        Ok(Self::with_parts(config, source, Lexicon::bundled()))
    }

    pub fn with_parts(
        config: PictogramConfig,
        source: Arc<dyn PictogramSource>,
        lexicon: Arc<Lexicon>,
    ) -> Self {
        let search_cache = JsonFileCache::new(config.cache_dir.join(SEARCH_CACHE_FILE));
        let results_cache = JsonFileCache::new(config.cache_dir.join(RESULTS_CACHE_FILE));
        let images = ImageCache::new(config.cache_dir.clone());

        Self {
            config,
            source,
            lexicon,
            search_cache: Mutex::new(search_cache),
            results_cache: Mutex::new(results_cache),
            images,
            stats: ProviderStats::new(),
        }
    }

    pub fn config(&self) -> &PictogramConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn stats(&self) -> ProviderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve `term` in `lang` to a pictogram id
    pub async fn search(&self, term: &str, lang: &str) -> Option<u64> {
        let term = normalize_term(term);
        let lang = normalize_lang(lang);
        if term.is_empty() || lang.is_empty() {
            return None;
        }
        let key = cache_key(&lang, &term);

        if let Some(entry) = self.search_cache.lock().await.get(&key).await.copied() {
            self.stats.record_search_hit();
            debug!(target: "pictogram", key = %key, id = ?entry, "Search cache hit");
            return entry;
        }
        self.stats.record_search_miss();

        match self.resolve_uncached(&term, &lang).await {
            Ok(Some(id)) => {
                self.search_cache.lock().await.insert(key, Some(id)).await;
                Some(id)
            }
            Ok(None) => {
                debug!(target: "pictogram", key = %key, "No pictogram for term");
                if self.config.cache_misses {
                    self.search_cache.lock().await.insert(key, None).await;
                }
                None
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(target: "pictogram", term = %term, lang = %lang, error = %e, "Pictogram search failed");
                None
            }
        }
    }

    async fn resolve_uncached(&self, term: &str, lang: &str) -> Result<Option<u64>> {
        if let Some(id) = self.lexicon.pinned_id(term, lang) {
            debug!(target: "pictogram", term = %term, id, "Using pinned lexicon id");
            return Ok(Some(id));
        }

        let direct = self.query_source(lang, term).await?;
        if let Some(first) = direct.first() {
            return Ok(Some(first.id));
        }

        let pivot = self.lexicon.pivot_language();
        if let Some(translated) = self.lexicon.translate(term, lang, pivot) {
            debug!(target: "pictogram", term = %term, translated = %translated, "Retrying with translated term");
            let results = self.query_source(pivot, translated).await?;
            return Ok(results.first().map(|r| r.id));
        }

        Ok(None)
    }

    async fn query_source(&self, lang: &str, term: &str) -> Result<Vec<PictogramRecord>> {
        self.stats.record_network_query();
        self.source.search(lang, term).await
    }

    /// Endpoint query through the results cache; failures contribute nothing
    async fn cached_query(&self, lang: &str, term: &str) -> Vec<PictogramRecord> {
        let key = cache_key(lang, term);
        if let Some(records) = self.results_cache.lock().await.get(&key).await.cloned() {
            self.stats.record_search_hit();
            return records;
        }
        self.stats.record_search_miss();

        match self.query_source(lang, term).await {
            Ok(records) => {
                if !records.is_empty() || self.config.cache_misses {
                    self.results_cache
                        .lock()
                        .await
                        .insert(key, records.clone())
                        .await;
                }
                records
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(target: "pictogram", term = %term, lang = %lang, error = %e, "Pictogram search failed");
                Vec::new()
            }
        }
    }

    /// Up to `limit` candidates for `term`.
    ///
    /// In `Smart` mode the direct-language results come first, followed by the
    /// results for the lexicon translation, de-duplicated by id. Translated
    /// results carry the original term as their label.
    pub async fn search_multiple(
        &self,
        term: &str,
        lang: &str,
        limit: usize,
        mode: SearchMode,
    ) -> Vec<PictogramMatch> {
        let normalized = normalize_term(term);
        let lang = normalize_lang(lang);
        if limit == 0 || normalized.is_empty() || lang.is_empty() {
            return Vec::new();
        }
        let lang = lang.as_str();

        let mut seen = HashSet::new();
        let mut matches = Vec::with_capacity(limit);

        for record in self.cached_query(lang, &normalized).await {
            if matches.len() >= limit {
                break;
            }
            if seen.insert(record.id) {
                matches.push(PictogramMatch {
                    id: record.id,
                    keywords: record.keyword_strings(),
                    label: None,
                    origin: MatchOrigin::Direct,
                });
            }
        }

        if mode == SearchMode::Smart && matches.len() < limit {
            let translation = self
                .lexicon
                .counterpart(lang)
                .and_then(|other| {
                    self.lexicon
                        .translate(&normalized, lang, other)
                        .map(|t| (other.to_string(), t.to_string()))
                });

            if let Some((other_lang, translated)) = translation {
                let label = term.trim().to_string();
                for record in self.cached_query(&other_lang, &translated).await {
                    if matches.len() >= limit {
                        break;
                    }
                    if seen.insert(record.id) {
                        matches.push(PictogramMatch {
                            id: record.id,
                            keywords: record.keyword_strings(),
                            label: Some(label.clone()),
                            origin: MatchOrigin::Translated,
                        });
                    }
                }
            }
        }

        matches
    }

    /// Local path of the pictogram image, downloading it on first use
    pub async fn get_image_path(&self, id: u64, resolution: u32) -> Option<PathBuf> {
        let resolution = snap_resolution(resolution, &self.config.resolutions);

        if let Some(path) = self.images.lookup(id, resolution) {
            self.stats.record_image_hit();
            return Some(path);
        }

        let bytes = match self.source.fetch_image(id, resolution).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_failure();
                warn!(target: "pictogram", id, resolution, error = %e, "Pictogram download failed");
                return None;
            }
        };

        match self.images.store(id, resolution, &bytes).await {
            Ok(path) => {
                self.stats.record_download();
                debug!(target: "pictogram", id, resolution, bytes = bytes.len(), "Cached pictogram image");
                Some(path)
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(target: "pictogram", id, resolution, error = %e, "Failed to write pictogram image");
                None
            }
        }
    }

    /// `search` followed by `get_image_path`
    pub async fn get_pictogram(&self, term: &str, lang: &str, resolution: u32) -> Option<PathBuf> {
        let id = self.search(term, lang).await?;
        self.get_image_path(id, resolution).await
    }

    /// Bytes currently used by the cache directory
    pub fn cache_size(&self) -> u64 {
        self.images.size_bytes()
    }

    /// Remove every cached file and forget the in-memory caches
    pub async fn clear_cache(&self) -> usize {
        // hold both locks so no lookup re-populates a file mid-clear
        let mut search_cache = self.search_cache.lock().await;
        let mut results_cache = self.results_cache.lock().await;

        let removed = self.images.clear();
        search_cache.reset();
        results_cache.reset();

        info!(target: "pictogram", removed, dir = %self.config.cache_dir.display(), "Cleared pictogram cache");
        removed
    }
}
