//! Expansion dictionary: keyword -> domain, phrases, weight, anti-patterns.
//!
//! A dictionary is built once from its YAML source and never mutated
//! afterwards; reloading builds a fresh one and swaps the shared reference
//! (see [`super::SynonymExpander`]).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{info, warn};

use crate::error::{Result, SearchError};

/// Domain label reported for keywords with no dictionary entry.
pub const GENERAL_DOMAIN: &str = "general";

const DEFAULT_WEIGHT: f64 = 1.0;

/// One curated keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionEntry {
    /// Normalized keyword (lowercase, single-spaced)
    pub keyword: String,
    pub domain: String,
    /// Expansion phrases in relevance order
    pub expansions: Vec<String>,
    pub weight: f64,
    pub anti_patterns: Vec<String>,
}

impl ExpansionEntry {
    /// Build an entry, dropping blank and duplicate phrases.
    ///
    /// Fails when an anti-pattern is also listed as an expansion, or when the
    /// weight is not a finite non-negative number.
    pub fn new(
        keyword: &str,
        domain: &str,
        expansions: Vec<String>,
        weight: f64,
        anti_patterns: Vec<String>,
    ) -> Result<Self> {
        let keyword = normalize_keyword(keyword);
        if keyword.is_empty() {
            return Err(SearchError::Dictionary(format!(
                "empty keyword in domain {domain}"
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SearchError::Dictionary(format!(
                "keyword {keyword}: weight must be a non-negative number, got {weight}"
            )));
        }

        let expansions = dedup_phrases(expansions);
        let anti_patterns = dedup_phrases(anti_patterns);

        let expansion_set: HashSet<String> =
            expansions.iter().map(|p| p.to_lowercase()).collect();
        if let Some(overlap) = anti_patterns
            .iter()
            .find(|p| expansion_set.contains(&p.to_lowercase()))
        {
            return Err(SearchError::Dictionary(format!(
                "keyword {keyword}: '{overlap}' is listed as both expansion and anti-pattern"
            )));
        }

        Ok(Self {
            keyword,
            domain: domain.to_string(),
            expansions,
            weight,
            anti_patterns,
        })
    }
}

/// How a raw keyword matched a dictionary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    /// Lowercased input equals the key
    Verbatim,
    /// Input only matched after whitespace/underscore normalization
    Normalized,
}

/// Immutable snapshot of the expansion dictionary.
#[derive(Debug, Clone)]
pub struct ExpansionDictionary {
    entries: HashMap<String, ExpansionEntry>,
    domains: Vec<String>,
    version: String,
    source: String,
    loaded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    expansions: Vec<String>,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    anti_patterns: Vec<String>,
}

const fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

impl ExpansionDictionary {
    /// Build a dictionary from already-constructed entries.
    pub fn from_entries(
        entries: impl IntoIterator<Item = ExpansionEntry>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let mut map: HashMap<String, ExpansionEntry> = HashMap::new();
        let mut domains: Vec<String> = Vec::new();
        for entry in entries {
            if !domains.contains(&entry.domain) {
                domains.push(entry.domain.clone());
            }
            if let Some(existing) = map.get(&entry.keyword) {
                return Err(SearchError::Dictionary(format!(
                    "keyword {} defined in both {} and {}",
                    entry.keyword, existing.domain, entry.domain
                )));
            }
            map.insert(entry.keyword.clone(), entry);
        }
        Ok(Self {
            entries: map,
            domains,
            version: version.into(),
            source: source.into(),
            loaded_at: Utc::now(),
        })
    }

    /// Read and parse a YAML dictionary file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SearchError::Dictionary(format!("read dictionary {}: {err}", path.display()))
        })?;
        let dictionary = Self::from_yaml_str(&raw, &path.display().to_string())?;
        info!(
            source = %path.display(),
            keywords = dictionary.len(),
            domains = dictionary.domains.len(),
            "Loaded expansion dictionary"
        );
        Ok(dictionary)
    }

    /// Load `path`, or the built-in dictionary when the file does not exist.
    pub fn load_or_fallback(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(source = %path.display(), "Dictionary file not found, using built-in fallback");
            Ok(Self::fallback())
        }
    }

    /// Parse the YAML dictionary format.
    ///
    /// Top level: optional `domains` list, optional `config.version`, and one
    /// mapping per domain. Without a `domains` list every other top-level
    /// mapping is treated as a domain.
    pub fn from_yaml_str(raw: &str, source: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(raw)
            .map_err(|err| SearchError::Dictionary(format!("parse {source}: {err}")))?;
        let Value::Mapping(root) = doc else {
            return Err(SearchError::Dictionary(format!(
                "{source}: top level must be a mapping"
            )));
        };

        let version = root
            .get("config")
            .and_then(|config| config.get("version"))
            .map(scalar_to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let domain_names: Vec<String> = match root.get("domains") {
            Some(Value::Sequence(items)) => items.iter().map(scalar_to_string).collect(),
            Some(_) => {
                return Err(SearchError::Dictionary(format!(
                    "{source}: `domains` must be a list"
                )));
            }
            None => root
                .iter()
                .filter_map(|(key, value)| match (key, value) {
                    (Value::String(name), Value::Mapping(_))
                        if name != "config" && name != "domains" =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                })
                .collect(),
        };

        let mut entries = Vec::new();
        for domain in &domain_names {
            let Some(section) = root.get(domain.as_str()) else {
                warn!(source, domain = %domain, "Domain listed without a section");
                continue;
            };
            let Value::Mapping(keywords) = section else {
                return Err(SearchError::Dictionary(format!(
                    "{source}: domain {domain} must be a mapping"
                )));
            };
            for (key, value) in keywords {
                let keyword = scalar_to_string(key);
                let raw_entry = match value {
                    Value::Sequence(_) => RawEntry {
                        expansions: serde_yaml::from_value(value.clone()).map_err(|err| {
                            SearchError::Dictionary(format!("{source}: {domain}.{keyword}: {err}"))
                        })?,
                        weight: DEFAULT_WEIGHT,
                        anti_patterns: Vec::new(),
                    },
                    Value::Mapping(_) => serde_yaml::from_value(value.clone()).map_err(|err| {
                        SearchError::Dictionary(format!("{source}: {domain}.{keyword}: {err}"))
                    })?,
                    Value::Null => RawEntry {
                        expansions: Vec::new(),
                        weight: DEFAULT_WEIGHT,
                        anti_patterns: Vec::new(),
                    },
                    _ => {
                        return Err(SearchError::Dictionary(format!(
                            "{source}: {domain}.{keyword} must be a list or a mapping"
                        )));
                    }
                };
                entries.push(ExpansionEntry::new(
                    &keyword,
                    domain,
                    raw_entry.expansions,
                    raw_entry.weight,
                    raw_entry.anti_patterns,
                )?);
            }
        }

        let mut dictionary = Self::from_entries(entries, version, source)?;
        // Keep declared order, including domains that ended up empty.
        dictionary.domains = domain_names;
        Ok(dictionary)
    }

    /// Minimal dictionary used when no source file is available.
    pub fn fallback() -> Self {
        let entry = |keyword: &str, domain: &str, expansions: &[&str], anti: &[&str]| {
            ExpansionEntry {
                keyword: keyword.to_string(),
                domain: domain.to_string(),
                expansions: expansions.iter().map(ToString::to_string).collect(),
                weight: DEFAULT_WEIGHT,
                anti_patterns: anti.iter().map(ToString::to_string).collect(),
            }
        };
        let entries = [
            entry(
                "api",
                "cloud",
                &["application programming interface", "rest api", "api gateway"],
                &["application form"],
            ),
            entry(
                "lan",
                "networking",
                &["local area network", "layer 2 switch", "vlan", "ethernet"],
                &["land development", "landscape"],
            ),
            entry(
                "cloud",
                "cloud",
                &["cloud services", "cloud computing", "cloud platform"],
                &[],
            ),
            entry(
                "security",
                "security",
                &["cyber security", "information security", "security solution"],
                &[],
            ),
        ];
        let map = entries
            .into_iter()
            .map(|entry| (entry.keyword.clone(), entry))
            .collect();
        Self {
            entries: map,
            domains: vec![
                "networking".to_string(),
                "cloud".to_string(),
                "security".to_string(),
            ],
            version: "fallback".to_string(),
            source: "built-in".to_string(),
            loaded_at: Utc::now(),
        }
    }

    /// Case-insensitive lookup of a raw (trimmed) keyword.
    pub fn lookup(&self, raw_keyword: &str) -> Option<(&ExpansionEntry, KeyMatch)> {
        let lowered = raw_keyword.trim().to_lowercase();
        if let Some(entry) = self.entries.get(&lowered) {
            return Some((entry, KeyMatch::Verbatim));
        }
        self.entries
            .get(&normalize_keyword(raw_keyword))
            .map(|entry| (entry, KeyMatch::Normalized))
    }

    pub fn get(&self, keyword: &str) -> Option<&ExpansionEntry> {
        self.lookup(keyword).map(|(entry, _)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// All keywords, sorted.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self.entries.keys().cloned().collect();
        keywords.sort();
        keywords
    }

    /// Keywords of one domain, sorted. Unknown domains yield an empty list.
    pub fn domain_keywords(&self, domain: &str) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.domain == domain)
            .map(|entry| entry.keyword.clone())
            .collect();
        keywords.sort();
        keywords
    }

    /// Keywords whose key or any expansion contains `query`.
    pub fn search_keywords(&self, query: &str, limit: usize) -> Vec<&ExpansionEntry> {
        let query = query.trim().to_lowercase();
        let mut matches: Vec<&ExpansionEntry> = self
            .entries
            .values()
            .filter(|entry| {
                entry.keyword.contains(&query)
                    || entry
                        .expansions
                        .iter()
                        .any(|phrase| phrase.to_lowercase().contains(&query))
            })
            .collect();
        matches.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        matches.truncate(limit);
        matches
    }

    pub fn statistics(&self) -> DictionaryStats {
        let total_expansions: usize = self.entries.values().map(|e| e.expansions.len()).sum();
        let mut domain_distribution = BTreeMap::new();
        for domain in &self.domains {
            domain_distribution.insert(domain.clone(), 0usize);
        }
        for entry in self.entries.values() {
            *domain_distribution.entry(entry.domain.clone()).or_insert(0) += 1;
        }
        let keywords = self.entries.len();
        let average_weight = if keywords == 0 {
            0.0
        } else {
            self.entries.values().map(|e| e.weight).sum::<f64>() / keywords as f64
        };

        DictionaryStats {
            total_keywords: keywords,
            total_expansions,
            average_expansions_per_keyword: if keywords == 0 {
                0.0
            } else {
                round2(total_expansions as f64 / keywords as f64)
            },
            domain_distribution,
            anti_patterns_configured: self
                .entries
                .values()
                .filter(|e| !e.anti_patterns.is_empty())
                .count(),
            average_weight: round2(average_weight),
            version: self.version.clone(),
            source: self.source.clone(),
            loaded_at: self.loaded_at,
        }
    }

    /// Report dictionary problems worth fixing in the source file.
    pub fn validate_quality(&self) -> QualityReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let keywords = self.keywords();

        let empty = keywords
            .iter()
            .filter(|k| self.entries[*k].expansions.is_empty())
            .count();
        if empty > 0 {
            issues.push(format!("{empty} keywords have no expansions"));
        }

        let single = keywords
            .iter()
            .filter(|k| self.entries[*k].expansions.len() == 1)
            .count();
        if single > 0 {
            warnings.push(format!(
                "{single} keywords have only 1 expansion (recommend 2+)"
            ));
        }

        let mut owners: HashMap<String, &str> = HashMap::new();
        for keyword in &keywords {
            for phrase in &self.entries[keyword].expansions {
                let key = phrase.to_lowercase();
                if let Some(owner) = owners.get(&key) {
                    warnings.push(format!(
                        "Duplicate expansion '{phrase}' in {keyword} and {owner}"
                    ));
                } else {
                    owners.insert(key, keyword);
                }
            }
        }

        let penalty = issues.len() * 10 + warnings.len() * 2;
        let quality_score = 100u32.saturating_sub(u32::try_from(penalty).unwrap_or(u32::MAX));
        let quality_rating = match quality_score {
            90.. => "excellent",
            70..=89 => "good",
            _ => "needs_improvement",
        };

        QualityReport {
            quality_score,
            quality_rating: quality_rating.to_string(),
            well_defined_keywords: self.entries.len() - empty - single,
            total_keywords: self.entries.len(),
            issues,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DictionaryStats {
    pub total_keywords: usize,
    pub total_expansions: usize,
    pub average_expansions_per_keyword: f64,
    pub domain_distribution: BTreeMap<String, usize>,
    pub anti_patterns_configured: usize,
    pub average_weight: f64,
    pub version: String,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub quality_score: u32,
    pub quality_rating: String,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub total_keywords: usize,
    pub well_defined_keywords: usize,
}

/// Lowercase, `_` to space, collapse whitespace.
pub fn normalize_keyword(raw: &str) -> String {
    raw.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedup_phrases(phrases: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    phrases
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.to_lowercase()))
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
