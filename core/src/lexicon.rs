//! Bilingual term lexicon
//!
//! Maps board vocabulary between a local language (Swedish in the bundled data)
//! and the pivot language the pictogram catalogue is richest in (English).
//! Entries may pin a pictogram id, which then wins over any network lookup.
//!
//! The bundled lexicon is parsed once per process.

use crate::pictogram::normalize_term;
use crate::{PecsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::error;

const BUNDLED_LEXICON: &str = include_str!("../data/lexicon.json");

static BUNDLED: OnceLock<Arc<Lexicon>> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntry {
    /// language code -> term
    pub terms: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    local_language: String,
    pivot_language: String,
    #[serde(default)]
    entries: Vec<LexiconEntry>,
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    local_language: String,
    pivot_language: String,
    entries: Vec<LexiconEntry>,
    // (lang, normalized term) -> entry index
    index: HashMap<(String, String), usize>,
}

impl Lexicon {
    /// The lexicon shipped with the crate
    pub fn bundled() -> Arc<Lexicon> {
        BUNDLED
            .get_or_init(|| match Lexicon::from_json(BUNDLED_LEXICON) {
                Ok(lexicon) => Arc::new(lexicon),
                Err(e) => {
                    error!(target: "lexicon", error = %e, "Bundled lexicon is invalid; using an empty one");
                    Arc::new(Lexicon::empty("sv", "en"))
                }
            })
            .clone()
    }

    pub fn empty(local_language: &str, pivot_language: &str) -> Self {
        Self {
            local_language: local_language.to_lowercase(),
            pivot_language: pivot_language.to_lowercase(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: LexiconFile = serde_json::from_str(data)
            .map_err(|e| PecsError::LexiconError(format!("invalid lexicon: {}", e)))?;
        if file.local_language.trim().is_empty() || file.pivot_language.trim().is_empty() {
            return Err(PecsError::LexiconError(
                "local_language and pivot_language are required".into(),
            ));
        }

        let mut lexicon = Self::empty(&file.local_language, &file.pivot_language);
        for entry in file.entries {
            lexicon.push(entry);
        }
        Ok(lexicon)
    }

    fn push(&mut self, entry: LexiconEntry) {
        let idx = self.entries.len();
        for (lang, term) in &entry.terms {
            let key = (lang.to_lowercase(), normalize_term(term));
            if key.1.is_empty() {
                continue;
            }
            // first entry wins for ambiguous terms
            self.index.entry(key).or_insert(idx);
        }
        self.entries.push(entry);
    }

    pub fn local_language(&self) -> &str {
        &self.local_language
    }

    pub fn pivot_language(&self) -> &str {
        &self.pivot_language
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, term: &str, lang: &str) -> Option<&LexiconEntry> {
        let key = (lang.trim().to_lowercase(), normalize_term(term));
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Translate `term` from one language to another
    pub fn translate(&self, term: &str, from: &str, to: &str) -> Option<&str> {
        let to = to.trim().to_lowercase();
        if from.trim().eq_ignore_ascii_case(&to) {
            return None;
        }
        self.entry(term, from)
            .and_then(|e| e.terms.get(&to))
            .map(String::as_str)
    }

    /// Pictogram id pinned for `term`, if any
    pub fn pinned_id(&self, term: &str, lang: &str) -> Option<u64> {
        self.entry(term, lang).and_then(|e| e.id)
    }

    /// The other language of the pair, when `lang` is one of them
    pub fn counterpart(&self, lang: &str) -> Option<&str> {
        let lang = lang.trim().to_lowercase();
        if lang == self.local_language {
            Some(self.pivot_language.as_str())
        } else if lang == self.pivot_language {
            Some(self.local_language.as_str())
        } else {
            None
        }
    }
}
