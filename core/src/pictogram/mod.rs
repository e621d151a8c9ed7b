//! Pictogram lookup backed by the ARASAAC API
//!
//! Resolves a term in a given language to a pictogram id, then to a locally
//! cached PNG. Everything is cache-first:
//! - `search_cache.json`: `"{lang}:{term}"` -> id (or `null` for a confirmed miss)
//! - `search_results_cache.json`: `"{lang}:{term}"` -> result records
//! - `{id}_{resolution}.png`: downloaded images, resolution snapped to a bucket
//!
//! Failures never reach the caller: lookups degrade to `None` / empty and are
//! logged on the `pictogram` target.
//!
//! Env overrides:
//! - PECS_CACHE_DIR, ARASAAC_API

pub mod cache;
pub mod provider;
pub mod resolution;
pub mod source;

pub use cache::{cache_key, normalize_lang, normalize_term, ImageCache, JsonFileCache};
pub use provider::{MatchOrigin, PictogramConfig, PictogramMatch, PictogramProvider, SearchMode};
pub use resolution::{snap_resolution, DEFAULT_RESOLUTIONS};
pub use source::{ArasaacClient, ArasaacConfig, Keyword, PictogramRecord, PictogramSource};
