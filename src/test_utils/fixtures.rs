//! Sample data and backends for tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::SqliteConfig;
use crate::error::{Result, SearchError};
use crate::search::backend::{CancelFlag, HealthStatus, ScoreOrder, SearchBackend};
use crate::search::filters::BackendPredicate;
use crate::search::types::{RawHit, TenderRecord};
use crate::search::SqliteFtsBackend;

/// Small dictionary covering the networking, software, cloud and security domains.
pub const SAMPLE_DICTIONARY: &str = r"
config:
  version: '2.1'
domains: [networking, software, cloud, security]
networking:
  lan:
    expansions: [local area network, vlan, ethernet]
    weight: 1.0
    anti_patterns: [land development]
  wan:
    expansions: [wide area network, mpls, sd-wan]
  wi_fi:
    - wireless network
    - wireless access point
software:
  api:
    expansions: [application programming interface, rest api, api gateway]
    anti_patterns: [application form]
  erp: [enterprise resource planning]
cloud:
  cloud:
    expansions: [cloud hosting, cloud services, cloud computing]
    weight: 0.9
security:
  security:
    expansions: [network security, cyber security, firewall]
  soc:
    expansions: [security operations centre]
";

/// Test fixture providing an isolated directory.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            data_path,
        }
    }

    /// Write `content` under the fixture directory.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    #[must_use]
    pub fn create_dictionary(&self) -> PathBuf {
        self.create_file("config/synonyms.yaml", SAMPLE_DICTIONARY)
    }
}

#[allow(clippy::too_many_arguments)]
fn record(
    id: &str,
    title: &str,
    organization: &str,
    status: &str,
    date: (i32, u32, u32),
    category: &str,
    region: &str,
    value_range: &str,
    department_type: &str,
    complexity: &str,
    keywords: &str,
) -> TenderRecord {
    TenderRecord {
        tender_id: id.to_string(),
        title: title.to_string(),
        organization: organization.to_string(),
        status: status.to_string(),
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
        url: format!("https://tenders.example.gov/{id}"),
        service_category: category.to_string(),
        value_range: value_range.to_string(),
        region: region.to_string(),
        department_type: department_type.to_string(),
        complexity: complexity.to_string(),
        keywords: keywords.to_string(),
    }
}

/// Eight tender records across several categories, regions and dates.
pub fn sample_records() -> Vec<TenderRecord> {
    vec![
        record("T-1001", "Campus local area network upgrade", "Ministry of Education", "Open", (2025, 1, 15), "IT Infrastructure", "North", "1-5 Cr", "Central", "Medium", "lan, switching, cabling"),
        record("T-1002", "Supply of ethernet switches and VLAN configuration", "Ministry of Health", "Open", (2025, 2, 10), "IT Infrastructure", "South", "<1 Cr", "Central", "Low", "ethernet, vlan"),
        record("T-1003", "Land development works for housing colony", "Urban Development Authority", "Open", (2025, 2, 20), "Civil Works", "North", ">10 Cr", "State", "High", "land, earthwork"),
        record("T-1004", "LAN cabling and land survey for district office", "District Collectorate", "Closed", (2024, 11, 5), "IT Infrastructure", "East", "<1 Cr", "District", "Low", "lan, survey"),
        record("T-1005", "REST API gateway development", "Ministry of Finance", "Open", (2025, 3, 5), "Software Development", "North", "1-5 Cr", "Central", "High", "api, integration"),
        record("T-1006", "Cloud hosting services for e-governance portal", "National Informatics Centre", "Open", (2025, 1, 28), "Cloud Services", "West", "5-10 Cr", "Central", "Medium", "cloud, hosting"),
        record("T-1007", "Network security audit and firewall deployment", "Ministry of Defence", "Closed", (2024, 12, 12), "Cybersecurity", "North", "1-5 Cr", "Central", "High", "security, firewall"),
        record("T-1008", "Wide area network and local area network maintenance", "State Power Corporation", "Open", (2025, 3, 18), "IT Infrastructure", "South", "1-5 Cr", "State", "Medium", "wan, lan"),
    ]
}

/// SQLite backend in a temp directory, preloaded with [`sample_records`].
///
/// Keep the returned `TempDir` alive for as long as the backend is used.
pub fn temp_sqlite_backend() -> (TempDir, SqliteFtsBackend) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = SqliteConfig {
        database_path: dir.path().join("tenders.db"),
        pool_size: 2,
        ..SqliteConfig::default()
    };
    let backend = SqliteFtsBackend::open(&config).expect("open sqlite backend");
    backend
        .index_records(&sample_records())
        .expect("index sample records");
    (dir, backend)
}

/// Scripted in-memory backend.
///
/// Returns fixed hits per phrase, in the order given. Can be made to fail or
/// to stall until cancelled.
pub struct MockBackend {
    name: String,
    order: ScoreOrder,
    hits: HashMap<String, Vec<(String, String, f64)>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_predicate: Mutex<Option<BackendPredicate>>,
}

impl MockBackend {
    pub fn new(name: &str, order: ScoreOrder) -> Self {
        Self {
            name: name.to_string(),
            order,
            hits: HashMap::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
            last_predicate: Mutex::new(None),
        }
    }

    /// Hits for `phrase` as `(id, title, raw_score)`.
    #[must_use]
    pub fn with_hits(mut self, phrase: &str, hits: &[(&str, &str, f64)]) -> Self {
        self.hits.insert(
            phrase.to_string(),
            hits.iter()
                .map(|(id, title, score)| ((*id).to_string(), (*title).to_string(), *score))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn failing(mut self, cause: &str) -> Self {
        self.failure = Some(cause.to_string());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Number of `execute_search` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_predicate(&self) -> Option<BackendPredicate> {
        self.last_predicate.lock().clone()
    }

    fn stall(&self, cancel: &CancelFlag) -> Result<()> {
        let Some(delay) = self.delay else {
            return Ok(());
        };
        let started = std::time::Instant::now();
        while started.elapsed() < delay {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    engine: self.name.clone(),
                });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

impl SearchBackend for MockBackend {
    fn engine(&self) -> &str {
        &self.name
    }

    fn score_order(&self) -> ScoreOrder {
        self.order
    }

    fn execute_search(
        &self,
        phrases: &[String],
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_predicate.lock() = Some(predicate.clone());
        self.stall(cancel)?;

        if let Some(cause) = &self.failure {
            return Err(SearchError::backend(self.name.clone(), cause));
        }

        let mut out = Vec::new();
        for phrase in phrases {
            let scripted = self.hits.get(phrase).map(Vec::as_slice).unwrap_or_default();
            out.extend(scripted.iter().take(limit).map(|(id, title, score)| RawHit {
                record: TenderRecord::new(id.clone(), title.clone()),
                raw_score: *score,
                matched_phrase: phrase.clone(),
            }));
        }
        Ok(out)
    }

    fn health_check(&self) -> HealthStatus {
        HealthStatus {
            engine: self.name.clone(),
            ok: self.failure.is_none(),
            latency_ms: 0,
            message: self.failure.clone(),
        }
    }
}
