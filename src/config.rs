use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Backend engine selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Sqlite,
    OpenSearch,
}

impl Engine {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::OpenSearch => "opensearch",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" | "fts5" => Ok(Self::Sqlite),
            "opensearch" | "open_search" | "elasticsearch" => Ok(Self::OpenSearch),
            other => Err(SearchError::Config(format!(
                "invalid engine {other} (expected sqlite|opensearch)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub sqlite: SqliteConfig,
    #[serde(default)]
    pub opensearch: OpenSearchConfig,
}

impl Config {
    /// Defaults, then global and project files (or one explicit file), then
    /// `TSEARCH_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("TSEARCH_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                SearchError::Config(format!("config file {} not found", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides_with(&|key: &str| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a complete TOML document over the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch = toml::from_str(raw)
            .map_err(|err| SearchError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join("tsearch/config.toml")),
            None => Ok(None),
        }
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&project_root.join("tsearch.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| SearchError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| SearchError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.dictionary {
            self.dictionary.merge(patch);
        }
        if let Some(patch) = patch.sqlite {
            self.sqlite.merge(patch);
        }
        if let Some(patch) = patch.opensearch {
            self.opensearch.merge(patch);
        }
    }

    /// Apply `TSEARCH_*` overrides read through `lookup`.
    pub fn apply_env_overrides_with(&mut self, lookup: EnvLookup<'_>) -> Result<()> {
        if let Some(value) = lookup("TSEARCH_ENGINE") {
            self.search.engine = value.parse()?;
        }
        if let Some(value) = env_u32(lookup, "TSEARCH_MAX_EXPANSIONS")? {
            self.search.max_expansions = value as usize;
        }
        if let Some(value) = env_u64(lookup, "TSEARCH_DEADLINE_MS")? {
            self.search.deadline = Duration::from_millis(value);
        }
        if let Some(value) = env_bool(lookup, "TSEARCH_FALLBACK_TO_SQLITE") {
            self.search.fallback_to_sqlite = value;
        }

        if let Some(value) = lookup("TSEARCH_DICTIONARY") {
            self.dictionary.path = PathBuf::from(value);
        }
        if let Some(value) = lookup("TSEARCH_DB_PATH") {
            self.sqlite.database_path = PathBuf::from(value);
        }

        if let Some(value) = lookup("TSEARCH_OPENSEARCH_URL") {
            self.opensearch.url = value;
        }
        if let Some(value) = lookup("TSEARCH_OPENSEARCH_INDEX") {
            self.opensearch.index = value;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.max_expansions == 0 {
            return Err(SearchError::Config("search.max_expansions must be at least 1".to_string()));
        }
        if search.max_limit == 0 || search.default_limit == 0 {
            return Err(SearchError::Config("search limits must be at least 1".to_string()));
        }
        if search.default_limit > search.max_limit {
            return Err(SearchError::Config(format!(
                "search.default_limit {} exceeds search.max_limit {}",
                search.default_limit, search.max_limit
            )));
        }
        if search.per_phrase_limit == 0 {
            return Err(SearchError::Config("search.per_phrase_limit must be at least 1".to_string()));
        }
        if search.deadline.is_zero() {
            return Err(SearchError::Config("search.deadline must be greater than zero".to_string()));
        }
        if self.sqlite.pool_size == 0 {
            return Err(SearchError::Config("sqlite.pool_size must be at least 1".to_string()));
        }
        for (name, weight) in [
            ("sqlite.title_weight", self.sqlite.title_weight),
            ("sqlite.keywords_weight", self.sqlite.keywords_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SearchError::Config(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub engine: Engine,
    pub max_expansions: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Upper bound on hits fetched per expansion phrase
    pub per_phrase_limit: usize,
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    pub parallel_phrases: bool,
    pub fallback_to_sqlite: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Sqlite,
            max_expansions: 5,
            default_limit: 25,
            max_limit: 100,
            per_phrase_limit: 100,
            deadline: Duration::from_secs(5),
            parallel_phrases: true,
            fallback_to_sqlite: false,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.engine {
            self.engine = value;
        }
        if let Some(value) = patch.max_expansions {
            self.max_expansions = value;
        }
        if let Some(value) = patch.default_limit {
            self.default_limit = value;
        }
        if let Some(value) = patch.max_limit {
            self.max_limit = value;
        }
        if let Some(value) = patch.per_phrase_limit {
            self.per_phrase_limit = value;
        }
        if let Some(value) = patch.deadline {
            self.deadline = value;
        }
        if let Some(value) = patch.parallel_phrases {
            self.parallel_phrases = value;
        }
        if let Some(value) = patch.fallback_to_sqlite {
            self.fallback_to_sqlite = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    pub path: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/synonyms.yaml"),
        }
    }
}

impl DictionaryConfig {
    fn merge(&mut self, patch: DictionaryPatch) {
        if let Some(value) = patch.path {
            self.path = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub database_path: PathBuf,
    pub cache_size_kb: u32,
    pub mmap_size_mb: u32,
    pub enable_wal: bool,
    pub pool_size: usize,
    /// bm25 column weights
    pub title_weight: f64,
    pub keywords_weight: f64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/tenders.db"),
            cache_size_kb: 64_000,
            mmap_size_mb: 256,
            enable_wal: true,
            pool_size: 5,
            title_weight: 10.0,
            keywords_weight: 1.0,
        }
    }
}

impl SqliteConfig {
    fn merge(&mut self, patch: SqlitePatch) {
        if let Some(value) = patch.database_path {
            self.database_path = value;
        }
        if let Some(value) = patch.cache_size_kb {
            self.cache_size_kb = value;
        }
        if let Some(value) = patch.mmap_size_mb {
            self.mmap_size_mb = value;
        }
        if let Some(value) = patch.enable_wal {
            self.enable_wal = value;
        }
        if let Some(value) = patch.pool_size {
            self.pool_size = value;
        }
        if let Some(value) = patch.title_weight {
            self.title_weight = value;
        }
        if let Some(value) = patch.keywords_weight {
            self.keywords_weight = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchConfig {
    pub url: String,
    pub index: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "tenders".to_string(),
            timeout: Duration::from_secs(30),
            username: None,
            password: None,
        }
    }
}

impl OpenSearchConfig {
    fn merge(&mut self, patch: OpenSearchPatch) {
        if let Some(value) = patch.url {
            self.url = value;
        }
        if let Some(value) = patch.index {
            self.index = value;
        }
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
        if patch.username.is_some() {
            self.username = patch.username;
        }
        if patch.password.is_some() {
            self.password = patch.password;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub search: Option<SearchPatch>,
    pub dictionary: Option<DictionaryPatch>,
    pub sqlite: Option<SqlitePatch>,
    pub opensearch: Option<OpenSearchPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchPatch {
    pub engine: Option<Engine>,
    pub max_expansions: Option<usize>,
    pub default_limit: Option<usize>,
    pub max_limit: Option<usize>,
    pub per_phrase_limit: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,
    pub parallel_phrases: Option<bool>,
    pub fallback_to_sqlite: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DictionaryPatch {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SqlitePatch {
    pub database_path: Option<PathBuf>,
    pub cache_size_kb: Option<u32>,
    pub mmap_size_mb: Option<u32>,
    pub enable_wal: Option<bool>,
    pub pool_size: Option<usize>,
    pub title_weight: Option<f64>,
    pub keywords_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OpenSearchPatch {
    pub url: Option<String>,
    pub index: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Environment reader used for overrides.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_bool(lookup: EnvLookup<'_>, key: &str) -> Option<bool> {
    lookup(key).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u32(lookup: EnvLookup<'_>, key: &str) -> Result<Option<u32>> {
    match lookup(key) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| SearchError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_u64(lookup: EnvLookup<'_>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| SearchError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}
