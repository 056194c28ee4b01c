//! Query execution against named database connections

use crate::config::{Config, DatabaseConfig};
use crate::error::{MigcheckError, Result};
use crate::tabular::{CellValue, TabularResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use std::collections::HashMap;

/// Runs SQL against a logical connection key (`source`, `target`, `framework`).
///
/// Implementations must allow concurrent calls with distinct keys.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, connection_key: &str) -> Result<TabularResult>;
}

const ATTACH_ALIAS: &str = "migcheck_db";

/// Executes every query in a fresh in-memory DuckDB session with the
/// configured database attached, so no connection outlives a call.
pub struct DuckDbQueryExecutor {
    connections: HashMap<String, DatabaseConfig>,
}

impl DuckDbQueryExecutor {
    pub fn new(connections: HashMap<String, DatabaseConfig>) -> Self {
        let connections = connections
            .into_iter()
            .map(|(key, config)| (key.to_lowercase(), config))
            .collect();
        Self { connections }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.connections.clone())
    }

    pub fn has_connection(&self, key: &str) -> bool {
        self.connections.contains_key(&key.to_lowercase())
    }
}

#[async_trait]
impl QueryExecutor for DuckDbQueryExecutor {
    async fn execute(&self, sql: &str, connection_key: &str) -> Result<TabularResult> {
        let key = connection_key.to_lowercase();
        let config = self.connections.get(&key).cloned().ok_or_else(|| {
            MigcheckError::connection(connection_key, "no connection configured with this key")
        })?;
        let sql = sql.to_string();

        log::debug!("Executing query on '{key}'");
        tokio::task::spawn_blocking(move || run_attached(&key, &config, &sql))
            .await
            .map_err(|e| MigcheckError::Other(anyhow::anyhow!("Query task failed: {e}")))?
    }
}

fn run_attached(key: &str, config: &DatabaseConfig, sql: &str) -> Result<TabularResult> {
    let attach = config
        .attach_statement(ATTACH_ALIAS)
        .map_err(|e| MigcheckError::connection(key, e.to_string()))?;

    let connection = Connection::open_in_memory()
        .map_err(|e| MigcheckError::connection(key, format!("Failed to open DuckDB connection: {e}")))?;
    connection
        .execute_batch(&attach)
        .map_err(|e| MigcheckError::connection(key, format!("Failed to attach database: {e}")))?;
    connection
        .execute_batch(&format!("USE {ATTACH_ALIAS};"))
        .map_err(|e| MigcheckError::connection(key, format!("Failed to use attached database: {e}")))?;

    execute_query_with_describe(&connection, sql)
        .map_err(|e| MigcheckError::query(key, sql, e.to_string()))
}

/// Run a query on an open connection, reading column names with `DESCRIBE`
pub fn execute_query_with_describe(connection: &Connection, sql: &str) -> Result<TabularResult> {
    let trimmed = sql.trim().trim_end_matches(';');

    let mut describe_stmt = connection.prepare(&format!("DESCRIBE {trimmed}"))?;
    let columns = describe_stmt
        .query_map([], |row| row.get::<usize, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = connection.prepare(trimmed)?;
    let column_count = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..column_count)
                .map(|i| row.get::<usize, Value>(i).map(to_cell))
                .collect::<std::result::Result<Vec<_>, _>>()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    TabularResult::new(columns, rows)
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn format_timestamp(micros: i64) -> Option<String> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).map(|ts| ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

fn format_time(micros: i64) -> Option<String> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).map(|t| t.format("%H:%M:%S%.f").to_string())
}

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn format_date(days: i32) -> Option<String> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn to_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Boolean(b) => CellValue::Boolean(b),
        Value::TinyInt(i) => CellValue::Integer(i64::from(i)),
        Value::SmallInt(i) => CellValue::Integer(i64::from(i)),
        Value::Int(i) => CellValue::Integer(i64::from(i)),
        Value::BigInt(i) => CellValue::Integer(i),
        Value::UTinyInt(i) => CellValue::Integer(i64::from(i)),
        Value::USmallInt(i) => CellValue::Integer(i64::from(i)),
        Value::UInt(i) => CellValue::Integer(i64::from(i)),
        Value::UBigInt(i) => i64::try_from(i)
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::String(i.to_string())),
        Value::HugeInt(i) => i64::try_from(i)
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::String(i.to_string())),
        Value::Float(f) => CellValue::Float(f64::from(f)),
        Value::Double(f) => CellValue::Float(f),
        Value::Decimal(d) => CellValue::String(d.to_string()),
        Value::Text(s) => CellValue::String(s),
        Value::Enum(s) => CellValue::String(s),
        Value::Blob(b) => CellValue::String(format!("BLOB({} bytes)", b.len())),
        Value::Date32(d) => format_date(d)
            .map(CellValue::String)
            .unwrap_or_else(|| CellValue::String(format!("Date({d})"))),
        Value::Time64(unit, t) => format_time(to_micros(unit, t))
            .map(CellValue::String)
            .unwrap_or_else(|| CellValue::String(format!("Time({t})"))),
        Value::Timestamp(unit, ts) => format_timestamp(to_micros(unit, ts))
            .map(CellValue::String)
            .unwrap_or_else(|| CellValue::String(format!("Timestamp({ts})"))),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_with_describe_on_memory_db() {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch(
                "CREATE TABLE users (id INTEGER, name VARCHAR, joined DATE);
                 INSERT INTO users VALUES (1, 'Alice', DATE '2024-03-01'), (2, NULL, NULL);",
            )
            .unwrap();

        let result = execute_query_with_describe(&connection, "SELECT * FROM users ORDER BY id;").unwrap();
        assert_eq!(result.columns(), &["id", "name", "joined"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.cell(0, 0), Some(&CellValue::Integer(1)));
        assert_eq!(result.cell(0, 2), Some(&CellValue::String("2024-03-01".to_string())));
        assert_eq!(result.cell(1, 1), Some(&CellValue::Null));
    }

    #[test]
    fn test_date_and_time_formatting() {
        assert_eq!(format_date(0).as_deref(), Some("1970-01-01"));
        assert_eq!(format_time(3_661_000_000).as_deref(), Some("01:01:01"));
        assert_eq!(
            format_timestamp(to_micros(TimeUnit::Second, 86_400)).as_deref(),
            Some("1970-01-02 00:00:00")
        );
    }

    #[tokio::test]
    async fn test_unknown_connection_key() {
        let executor = DuckDbQueryExecutor::new(HashMap::new());
        let err = executor.execute("SELECT 1", "framework").await.unwrap_err();
        assert!(matches!(err, MigcheckError::Connection { ref key, .. } if key == "framework"));
    }

    #[tokio::test]
    async fn test_attach_failure_is_connection_error() {
        let mut connections = HashMap::new();
        connections.insert(
            "Source".to_string(),
            DatabaseConfig {
                db_type: crate::config::DatabaseType::Sqlite,
                connection_string: None,
                host: None,
                port: None,
                database: None,
                username: None,
                password_env: None,
            },
        );
        let executor = DuckDbQueryExecutor::new(connections);
        assert!(executor.has_connection("SOURCE"));

        let err = executor.execute("SELECT 1", "source").await.unwrap_err();
        assert!(matches!(err, MigcheckError::Connection { .. }));
    }
}
