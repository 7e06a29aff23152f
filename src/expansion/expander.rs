//! Synonym expander over a hot-swappable dictionary snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::dictionary::{ExpansionDictionary, GENERAL_DOMAIN, KeyMatch};
use crate::error::{Result, SearchError};

/// Confidence at or above which an expansion counts as curated.
pub const CURATED_THRESHOLD: f64 = 0.9;

const VERBATIM_CONFIDENCE: f64 = 0.95;
const NORMALIZED_CONFIDENCE: f64 = 0.9;
const UNCURATED_CONFIDENCE: f64 = 0.3;
const UNCURATED_WEIGHT: f64 = 0.5;

/// Default number of phrases returned per keyword.
pub const DEFAULT_MAX_EXPANSIONS: usize = 5;

/// Where the phrases of an [`ExpansionResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionSource {
    /// Keyword has a dictionary entry
    Curated,
    /// Keyword unknown; the literal keyword is searched instead
    NoCuratedExpansion,
}

/// Per-query expansion of one keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionResult {
    /// Input keyword as given (trimmed)
    pub keyword: String,
    pub normalized_keyword: String,
    pub expanded_phrases: Vec<String>,
    pub domain: String,
    pub confidence: f64,
    pub weight: f64,
    pub anti_patterns: Vec<String>,
    pub source: ExpansionSource,
}

impl ExpansionResult {
    pub fn is_curated(&self) -> bool {
        self.source == ExpansionSource::Curated
    }
}

/// Expand `keyword` against one dictionary snapshot.
///
/// Never fails: unknown keywords come back as their own single phrase.
/// The result always holds at least one phrase, so a `max_expansions` of 0
/// is treated as 1. Callers that must reject 0 validate it first.
pub fn expand_with(
    dictionary: &ExpansionDictionary,
    keyword: &str,
    max_expansions: usize,
) -> ExpansionResult {
    let keyword = keyword.trim();
    let max_expansions = max_expansions.max(1);

    match dictionary.lookup(keyword) {
        Some((entry, key_match)) => {
            let mut phrases: Vec<String> =
                entry.expansions.iter().take(max_expansions).cloned().collect();
            // Found but without synonyms: still search the keyword itself.
            if phrases.is_empty() {
                phrases.push(keyword.to_string());
            }
            let confidence = match key_match {
                KeyMatch::Verbatim => VERBATIM_CONFIDENCE,
                KeyMatch::Normalized => NORMALIZED_CONFIDENCE,
            };
            ExpansionResult {
                keyword: keyword.to_string(),
                normalized_keyword: entry.keyword.clone(),
                expanded_phrases: phrases,
                domain: entry.domain.clone(),
                confidence,
                weight: entry.weight,
                anti_patterns: entry.anti_patterns.clone(),
                source: ExpansionSource::Curated,
            }
        }
        None => ExpansionResult {
            keyword: keyword.to_string(),
            normalized_keyword: super::normalize_keyword(keyword),
            expanded_phrases: vec![keyword.to_string()],
            domain: GENERAL_DOMAIN.to_string(),
            confidence: UNCURATED_CONFIDENCE,
            weight: UNCURATED_WEIGHT,
            anti_patterns: Vec::new(),
            source: ExpansionSource::NoCuratedExpansion,
        },
    }
}

/// Outcome of a dictionary reload.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub previous_keywords: usize,
    pub current_keywords: usize,
    pub previous_domains: usize,
    pub current_domains: usize,
    pub version: String,
    pub reloaded_at: DateTime<Utc>,
}

/// Keyword expander shared by all requests.
///
/// Holds the dictionary behind an `RwLock<Arc<_>>`: readers take one `Arc`
/// clone per call and work on that snapshot, reloads replace the `Arc`
/// wholesale after the new dictionary is fully built.
pub struct SynonymExpander {
    dictionary: RwLock<Arc<ExpansionDictionary>>,
    source_path: Option<PathBuf>,
}

impl SynonymExpander {
    pub fn new(dictionary: ExpansionDictionary) -> Self {
        Self {
            dictionary: RwLock::new(Arc::new(dictionary)),
            source_path: None,
        }
    }

    /// Load the dictionary at `path` (built-in fallback if it is missing) and
    /// remember the path for [`Self::reload`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dictionary = ExpansionDictionary::load_or_fallback(path)?;
        Ok(Self {
            dictionary: RwLock::new(Arc::new(dictionary)),
            source_path: Some(path.to_path_buf()),
        })
    }

    /// Current dictionary snapshot.
    pub fn snapshot(&self) -> Arc<ExpansionDictionary> {
        Arc::clone(&self.dictionary.read())
    }

    pub fn expand(&self, keyword: &str, max_expansions: usize) -> ExpansionResult {
        let dictionary = self.snapshot();
        let result = expand_with(&dictionary, keyword, max_expansions);
        debug!(
            keyword = %result.keyword,
            phrases = result.expanded_phrases.len(),
            domain = %result.domain,
            source = ?result.source,
            "Expanded keyword"
        );
        result
    }

    /// Swap in a new dictionary, returning the one it replaced.
    pub fn replace(&self, dictionary: ExpansionDictionary) -> Arc<ExpansionDictionary> {
        let next = Arc::new(dictionary);
        std::mem::replace(&mut *self.dictionary.write(), next)
    }

    /// Re-read the source file and swap it in.
    ///
    /// The file must exist and parse completely; on failure the current
    /// dictionary stays active.
    pub fn reload(&self) -> Result<ReloadReport> {
        let path = self.source_path.as_deref().ok_or_else(|| {
            SearchError::Dictionary("expander has no source file to reload from".to_string())
        })?;
        match ExpansionDictionary::load(path) {
            Ok(dictionary) => Ok(self.install(dictionary)),
            Err(err) => {
                warn!(source = %path.display(), error = %err, "Dictionary reload failed, keeping current snapshot");
                Err(err)
            }
        }
    }

    /// Parse `raw` YAML and swap it in.
    pub fn reload_from_str(&self, raw: &str, source: &str) -> Result<ReloadReport> {
        let dictionary = ExpansionDictionary::from_yaml_str(raw, source)?;
        Ok(self.install(dictionary))
    }

    fn install(&self, dictionary: ExpansionDictionary) -> ReloadReport {
        let current_keywords = dictionary.len();
        let current_domains = dictionary.domains().len();
        let version = dictionary.version().to_string();
        let reloaded_at = dictionary.loaded_at();
        let previous = self.replace(dictionary);

        info!(
            previous = previous.len(),
            current = current_keywords,
            version = %version,
            "Expansion dictionary reloaded"
        );

        ReloadReport {
            previous_keywords: previous.len(),
            current_keywords,
            previous_domains: previous.domains().len(),
            current_domains,
            version,
            reloaded_at,
        }
    }
}
