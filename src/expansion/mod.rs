//! Domain-aware keyword expansion
//!
//! Turns a short, acronym-heavy keyword into an ordered list of phrases to
//! search for, using a curated dictionary loaded from YAML.

pub mod dictionary;
pub mod expander;

pub use dictionary::{
    DictionaryStats, ExpansionDictionary, ExpansionEntry, GENERAL_DOMAIN, KeyMatch,
    QualityReport, normalize_keyword,
};
pub use expander::{
    CURATED_THRESHOLD, DEFAULT_MAX_EXPANSIONS, ExpansionResult, ExpansionSource, ReloadReport,
    SynonymExpander, expand_with,
};
