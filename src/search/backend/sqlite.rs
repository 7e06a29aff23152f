//! Embedded full-text backend on SQLite FTS5.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use chrono::NaiveDate;
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info};

use super::{CancelFlag, HealthStatus, ScoreOrder, SearchBackend};
use crate::config::SqliteConfig;
use crate::error::{Result, SearchError};
use crate::search::filters::{BackendPredicate, Clause};
use crate::search::types::{DATE_COLUMN, FilterField, RawHit, TenderRecord};

pub const ENGINE: &str = "sqlite";

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS tenders USING fts5(
    title,
    keywords,
    tender_id UNINDEXED,
    org UNINDEXED,
    status UNINDEXED,
    aoc_date UNINDEXED,
    url UNINDEXED,
    service_category UNINDEXED,
    value_range UNINDEXED,
    region UNINDEXED,
    department_type UNINDEXED,
    complexity UNINDEXED,
    tokenize = 'porter unicode61'
);";

const SELECT_COLUMNS: &str = "tender_id, title, org, status, aoc_date, url, service_category, \
     value_range, region, department_type, complexity, keywords";

static FTS5_SPECIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[@#$%^&*+=|\\:;"'<>,.?/()\[\]{}~`!]"#).expect("static regex is valid")
});

/// Distinct value of a filter column and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
}

/// A facet value with its percentage of all records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub value: String,
    pub count: u64,
    pub percentage: f64,
}

impl Share {
    #[allow(clippy::cast_precision_loss)]
    fn of(facet: FacetValue, total: u64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            round1(facet.count as f64 / total as f64 * 100.0)
        };
        Self {
            value: facet.value,
            count: facet.count,
            percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateCoverage {
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
    pub unique_dates: u64,
    pub span_days: i64,
}

/// Title length in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleLengths {
    pub average: f64,
    pub min: u64,
    pub max: u64,
}

/// Snapshot of what the local index holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatistics {
    pub engine: String,
    pub total_records: u64,
    pub database_size_bytes: u64,
    pub service_categories: Vec<Share>,
    pub regions: Vec<Share>,
    pub value_ranges: Vec<Share>,
    pub top_organizations: Vec<FacetValue>,
    pub dates: DateCoverage,
    pub titles: TitleLengths,
}

const TOP_ORGANIZATIONS: usize = 10;

/// SQLite FTS5 adapter.
///
/// Relevance is `bm25()` with per-column weights; FTS5 reports it negated,
/// so lower scores rank higher.
pub struct SqliteFtsBackend {
    path: PathBuf,
    config: SqliteConfig,
    pool: Mutex<Vec<Connection>>,
    search_sql: String,
}

impl SqliteFtsBackend {
    /// Open (creating if needed) the database at `config.database_path`.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let path = config.database_path.clone();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let backend = Self {
            search_sql: build_search_sql(config.title_weight, config.keywords_weight),
            path,
            config: config.clone(),
            pool: Mutex::new(Vec::with_capacity(config.pool_size)),
        };

        let conn = backend.checkout()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        info!(path = %backend.path.display(), "SQLite FTS5 backend ready");
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        self.configure_pragmas(&conn)?;
        Ok(conn)
    }

    fn configure_pragmas(&self, conn: &Connection) -> Result<()> {
        let journal = if self.config.enable_wal { "WAL" } else { "DELETE" };
        let mmap_bytes = u64::from(self.config.mmap_size_mb) * 1024 * 1024;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {journal};
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -{cache};
             PRAGMA mmap_size = {mmap_bytes};
             PRAGMA temp_store = MEMORY;",
            cache = self.config.cache_size_kb,
        ))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }

    fn checkout(&self) -> Result<PooledConnection<'_>> {
        let pooled = self.pool.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection {
            backend: self,
            conn: Some(conn),
        })
    }

    fn release(&self, conn: Connection) {
        let mut pool = self.pool.lock();
        if pool.len() < self.config.pool_size {
            pool.push(conn);
        }
    }

    /// Insert or replace records, keyed by `tender_id`.
    pub fn index_records(&self, records: &[TenderRecord]) -> Result<usize> {
        let mut conn = self.checkout()?;
        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare("DELETE FROM tenders WHERE tender_id = ?1")?;
            let mut insert = tx.prepare(&format!(
                "INSERT INTO tenders ({SELECT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for record in records {
                delete.execute(params![record.tender_id])?;
                let date = record
                    .date
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default();
                insert.execute(params![
                    record.tender_id,
                    record.title,
                    record.organization,
                    record.status,
                    date,
                    record.url,
                    record.service_category,
                    record.value_range,
                    record.region,
                    record.department_type,
                    record.complexity,
                    record.keywords,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = records.len(), "Indexed tender records");
        Ok(records.len())
    }

    pub fn record_count(&self) -> Result<u64> {
        let conn = self.checkout()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tenders", [], |row| row.get(0))?;
        Ok(count_value(count))
    }

    /// Distinct non-empty values per filter category, most common first.
    pub fn filter_options(&self) -> Result<BTreeMap<FilterField, Vec<FacetValue>>> {
        let conn = self.checkout()?;
        let mut options = BTreeMap::new();
        for field in FilterField::ALL {
            options.insert(field, group_counts(&conn, field, None)?);
        }
        Ok(options)
    }

    /// Summary figures for the whole index.
    pub fn statistics(&self) -> Result<IndexStatistics> {
        let conn = self.checkout()?;
        let total_records = count_value(conn.query_row(
            "SELECT COUNT(*) FROM tenders",
            [],
            |row| row.get(0),
        )?);

        let shares = |field: FilterField| -> Result<Vec<Share>> {
            Ok(group_counts(&conn, field, None)?
                .into_iter()
                .map(|facet| Share::of(facet, total_records))
                .collect())
        };
        let service_categories = shares(FilterField::ServiceCategory)?;
        let regions = shares(FilterField::Region)?;
        let value_ranges = shares(FilterField::ValueRange)?;
        let top_organizations =
            group_counts(&conn, FilterField::Organization, Some(TOP_ORGANIZATIONS))?;

        let (earliest, latest, unique_dates): (Option<String>, Option<String>, i64) = conn
            .query_row(
                &format!(
                    "SELECT MIN({DATE_COLUMN}), MAX({DATE_COLUMN}), COUNT(DISTINCT {DATE_COLUMN}) \
                     FROM tenders WHERE {DATE_COLUMN} != ''"
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        let earliest = earliest.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok());
        let latest = latest.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok());
        let span_days = match (earliest, latest) {
            (Some(from), Some(to)) => (to - from).num_days(),
            _ => 0,
        };

        let (average, min, max): (Option<f64>, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT AVG(LENGTH(title)), MIN(LENGTH(title)), MAX(LENGTH(title)) FROM tenders",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        drop(conn);

        let database_size_bytes = std::fs::metadata(&self.path)?.len();
        debug!(total_records, database_size_bytes, "Computed index statistics");

        Ok(IndexStatistics {
            engine: ENGINE.to_string(),
            total_records,
            database_size_bytes,
            service_categories,
            regions,
            value_ranges,
            top_organizations,
            dates: DateCoverage {
                earliest,
                latest,
                unique_dates: count_value(unique_dates),
                span_days,
            },
            titles: TitleLengths {
                average: round1(average.unwrap_or(0.0)),
                min: count_value(min.unwrap_or(0)),
                max: count_value(max.unwrap_or(0)),
            },
        })
    }

    fn search_phrase(
        &self,
        conn: &Connection,
        phrase: &str,
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>> {
        let Some(match_expr) = fts5_phrase(phrase) else {
            return Ok(Vec::new());
        };

        let (where_sql, mut values) = predicate_sql(predicate);
        values.insert(0, Value::Text(match_expr));
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let sql = format!(
            "{base} {where_sql} ORDER BY score ASC, tender_id ASC LIMIT ?",
            base = self.search_sql
        );
        let mut stmt = conn.prepare(&sql).map_err(|err| SearchError::backend(ENGINE, err))?;
        let mut rows = stmt
            .query(params_from_iter(values))
            .map_err(|err| SearchError::backend(ENGINE, err))?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().map_err(|err| SearchError::backend(ENGINE, err))? {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    engine: ENGINE.to_string(),
                });
            }
            let hit = row_to_hit(row, phrase).map_err(|err| SearchError::backend(ENGINE, err))?;
            hits.push(hit);
        }
        Ok(hits)
    }
}

impl SearchBackend for SqliteFtsBackend {
    fn engine(&self) -> &str {
        ENGINE
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::LowerIsBetter
    }

    fn execute_search(
        &self,
        phrases: &[String],
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>> {
        let conn = self
            .checkout()
            .map_err(|err| SearchError::backend(ENGINE, err))?;
        let mut hits = Vec::new();
        for phrase in phrases {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    engine: ENGINE.to_string(),
                });
            }
            let found = self.search_phrase(&conn, phrase, predicate, limit, cancel)?;
            debug!(phrase = %phrase, hits = found.len(), "FTS5 phrase query");
            hits.extend(found);
        }
        Ok(hits)
    }

    fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let probe = self.checkout().and_then(|conn| {
            let integrity: String =
                conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tenders", [], |row| row.get(0))?;
            Ok((integrity, count))
        });
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match probe {
            Ok((integrity, count)) if integrity == "ok" => HealthStatus {
                engine: ENGINE.to_string(),
                ok: true,
                latency_ms,
                message: Some(format!("{count} records indexed")),
            },
            Ok((integrity, _)) => HealthStatus {
                engine: ENGINE.to_string(),
                ok: false,
                latency_ms,
                message: Some(format!("integrity check failed: {integrity}")),
            },
            Err(err) => HealthStatus {
                engine: ENGINE.to_string(),
                ok: false,
                latency_ms,
                message: Some(err.to_string()),
            },
        }
    }
}

/// Connection borrowed from the pool; returned on drop.
struct PooledConnection<'a> {
    backend: &'a SqliteFtsBackend,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.backend.release(conn);
        }
    }
}

fn build_search_sql(title_weight: f64, keywords_weight: f64) -> String {
    format!(
        "SELECT {SELECT_COLUMNS}, bm25(tenders, {title_weight:?}, {keywords_weight:?}) AS score \
         FROM tenders WHERE tenders MATCH ?"
    )
}

/// Strip FTS5 operator characters and collapse whitespace.
pub fn sanitize_fts5(phrase: &str) -> String {
    let cleaned = FTS5_SPECIAL.replace_all(phrase, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quoted FTS5 phrase query, or `None` when nothing searchable remains.
fn fts5_phrase(phrase: &str) -> Option<String> {
    let sanitized = sanitize_fts5(phrase);
    (!sanitized.is_empty()).then(|| format!("\"{sanitized}\""))
}

/// `AND ...` clauses for the predicate plus their bound values, in order.
fn predicate_sql(predicate: &BackendPredicate) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut values = Vec::new();
    for clause in &predicate.clauses {
        match clause {
            Clause::In { field, values: selected } => {
                let marks = vec!["?"; selected.len()].join(", ");
                sql.push_str(&format!(" AND {} IN ({marks})", field.column()));
                values.extend(selected.iter().cloned().map(Value::Text));
            }
            Clause::DateBetween { from, to } => {
                sql.push_str(&format!(" AND {DATE_COLUMN} >= ? AND {DATE_COLUMN} <= ?"));
                values.push(date_value(*from));
                values.push(date_value(*to));
            }
            Clause::DateOnOrAfter { from } => {
                sql.push_str(&format!(" AND {DATE_COLUMN} >= ?"));
                values.push(date_value(*from));
            }
            Clause::DateOnOrBefore { to } => {
                sql.push_str(&format!(" AND {DATE_COLUMN} != '' AND {DATE_COLUMN} <= ?"));
                values.push(date_value(*to));
            }
        }
    }
    (sql, values)
}

/// Non-empty values of one column with their counts, most common first.
fn group_counts(
    conn: &Connection,
    field: FilterField,
    limit: Option<usize>,
) -> Result<Vec<FacetValue>> {
    let column = field.column();
    let limit_sql = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) AS n FROM tenders \
         WHERE {column} IS NOT NULL AND {column} != '' \
         GROUP BY {column} ORDER BY n DESC, {column} ASC{limit_sql}"
    ))?;
    let values = stmt
        .query_map([], |row| {
            Ok(FacetValue {
                value: row.get(0)?,
                count: count_value(row.get(1)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(values)
}

fn count_value(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

fn row_to_hit(row: &Row<'_>, phrase: &str) -> rusqlite::Result<RawHit> {
    let date: String = row.get(4)?;
    let record = TenderRecord {
        tender_id: row.get(0)?,
        title: row.get(1)?,
        organization: row.get(2)?,
        status: row.get(3)?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT).ok(),
        url: row.get(5)?,
        service_category: row.get(6)?,
        value_range: row.get(7)?,
        region: row.get(8)?,
        department_type: row.get(9)?,
        complexity: row.get(10)?,
        keywords: row.get(11)?,
    };
    Ok(RawHit {
        record,
        raw_score: row.get(12)?,
        matched_phrase: phrase.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filters::FilterTranslator;
    use crate::search::types::SearchFilters;
    use crate::test_utils::fixtures::{sample_records, temp_sqlite_backend};

    fn phrases(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_sanitize_strips_operators() {
        assert_eq!(sanitize_fts5("  wi-fi: \"6\" (ax) "), "wi-fi 6 ax");
        assert_eq!(sanitize_fts5("***"), "");
        assert_eq!(fts5_phrase("a.b"), Some("\"a b\"".to_string()));
        assert_eq!(fts5_phrase("?!"), None);
    }

    #[test]
    fn test_index_and_count() {
        let (_dir, backend) = temp_sqlite_backend();
        assert_eq!(backend.record_count().unwrap(), sample_records().len() as u64);

        // Re-indexing the same ids replaces rather than duplicates.
        backend.index_records(&sample_records()[..2]).unwrap();
        assert_eq!(backend.record_count().unwrap(), sample_records().len() as u64);
    }

    #[test]
    fn test_phrase_hits_are_tagged_and_negative() {
        let (_dir, backend) = temp_sqlite_backend();
        let hits = backend
            .execute_search(
                &phrases(&["local area network", "vlan"]),
                &BackendPredicate::default(),
                10,
                &CancelFlag::new(),
            )
            .unwrap();

        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(hit.raw_score <= 0.0, "bm25 is reported negated");
            let haystack = format!("{} {}", hit.record.title, hit.record.keywords).to_lowercase();
            assert!(haystack.contains(&hit.matched_phrase));
        }
        assert!(hits.iter().any(|h| h.matched_phrase == "vlan"));
        assert!(hits.iter().any(|h| h.matched_phrase == "local area network"));
    }

    #[test]
    fn test_limit_applies_per_phrase() {
        let (_dir, backend) = temp_sqlite_backend();
        let hits = backend
            .execute_search(
                &phrases(&["network", "lan"]),
                &BackendPredicate::default(),
                1,
                &CancelFlag::new(),
            )
            .unwrap();
        assert_eq!(hits.iter().filter(|h| h.matched_phrase == "network").count(), 1);
        assert_eq!(hits.iter().filter(|h| h.matched_phrase == "lan").count(), 1);
    }

    #[test]
    fn test_predicate_restricts_rows() {
        let (_dir, backend) = temp_sqlite_backend();
        let filters = SearchFilters::default()
            .with(FilterField::Status, ["Closed"])
            .with_dates(NaiveDate::from_ymd_opt(2024, 1, 1), NaiveDate::from_ymd_opt(2024, 12, 31));
        let predicate = FilterTranslator::translate(&filters).unwrap();
        let hits = backend
            .execute_search(&phrases(&["network", "lan"]), &predicate, 50, &CancelFlag::new())
            .unwrap();

        assert!(!hits.is_empty());
        for hit in hits {
            assert_eq!(hit.record.status, "Closed");
            let date = hit.record.date.unwrap();
            assert!(date.format("%Y").to_string() == "2024");
        }
    }

    #[test]
    fn test_cancelled_flag_stops_search() {
        let (_dir, backend) = temp_sqlite_backend();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = backend
            .execute_search(&phrases(&["lan"]), &BackendPredicate::default(), 10, &cancel)
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled { .. }));
    }

    #[test]
    fn test_unsearchable_phrase_yields_nothing() {
        let (_dir, backend) = temp_sqlite_backend();
        let hits = backend
            .execute_search(&phrases(&["&&&"]), &BackendPredicate::default(), 10, &CancelFlag::new())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_filter_options_and_health() {
        let (_dir, backend) = temp_sqlite_backend();
        let options = backend.filter_options().unwrap();
        let statuses = &options[&FilterField::Status];
        assert!(statuses.iter().any(|f| f.value == "Open"));
        let total: u64 = statuses.iter().map(|f| f.count).sum();
        assert_eq!(total, sample_records().len() as u64);

        let health = backend.health_check();
        assert!(health.ok);
        assert_eq!(health.engine, ENGINE);
    }

    #[test]
    fn test_statistics_summarize_index() {
        let (_dir, backend) = temp_sqlite_backend();
        let stats = backend.statistics().unwrap();

        assert_eq!(stats.engine, ENGINE);
        assert_eq!(stats.total_records, 8);
        assert!(stats.database_size_bytes > 0);

        let north = &stats.regions[0];
        assert_eq!((north.value.as_str(), north.count), ("North", 4));
        assert!((north.percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(stats.service_categories[0].value, "IT Infrastructure");
        assert_eq!(stats.value_ranges[0].value, "1-5 Cr");
        assert_eq!(stats.value_ranges[0].count, 4);

        assert_eq!(stats.top_organizations.len(), 8);
        assert_eq!(stats.top_organizations[0].value, "District Collectorate");

        assert_eq!(stats.dates.earliest, NaiveDate::from_ymd_opt(2024, 11, 5));
        assert_eq!(stats.dates.latest, NaiveDate::from_ymd_opt(2025, 3, 18));
        assert_eq!(stats.dates.unique_dates, 8);
        assert_eq!(stats.dates.span_days, 133);

        assert_eq!((stats.titles.min, stats.titles.max), (28, 52));
        assert!((stats.titles.average - 42.9).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_on_empty_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = SqliteFtsBackend::open(&SqliteConfig {
            database_path: dir.path().join("empty.db"),
            ..SqliteConfig::default()
        })
        .unwrap();

        let stats = backend.statistics().unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.regions.is_empty());
        assert_eq!(stats.dates.earliest, None);
        assert_eq!(stats.dates.span_days, 0);
        assert_eq!(stats.titles.max, 0);
    }
}
