//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use migcheck_core::batch_config::{BatchExportConfig, Destination, QueryConfig};
use migcheck_core::error::{MigcheckError, Result};
use migcheck_core::executor::QueryExecutor;
use migcheck_core::metadata::MetadataProvider;
use migcheck_core::schema_diff::IndexDetailRow;
use migcheck_core::tabular::{CellValue, TabularResult};
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Query executor answering from a fixed table of SQL text to results
#[derive(Default)]
pub struct MockExecutor {
    results: HashMap<String, TabularResult>,
    failing: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, sql: &str, result: TabularResult) -> Self {
        self.results.insert(sql.to_string(), result);
        self
    }

    pub fn with_failure(mut self, sql: &str, message: &str) -> Self {
        self.failing.insert(sql.to_string(), message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(connection_key, sql)` pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Most queries that were running at the same moment
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, sql: &str, connection_key: &str) -> Result<TabularResult> {
        self.calls
            .lock()
            .unwrap()
            .push((connection_key.to_string(), sql.to_string()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = self.failing.get(sql) {
            return Err(MigcheckError::query(connection_key, sql, message.clone()));
        }
        self.results
            .get(sql)
            .cloned()
            .ok_or_else(|| MigcheckError::query(connection_key, sql, "no canned result"))
    }
}

/// Metadata provider backed by in-memory tables
#[derive(Default)]
pub struct MockMetadata {
    tables: HashMap<String, Vec<String>>,
    primary_keys: HashMap<(String, String), Vec<String>>,
    indexes: HashMap<(String, String), Vec<IndexDetailRow>>,
}

impl MockMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        mut self,
        connection: &str,
        table: &str,
        primary_keys: &[&str],
        indexes: Vec<IndexDetailRow>,
    ) -> Self {
        self.tables
            .entry(connection.to_string())
            .or_default()
            .push(table.to_string());
        let key = (connection.to_string(), table.to_lowercase());
        self.primary_keys
            .insert(key.clone(), primary_keys.iter().map(|k| k.to_string()).collect());
        self.indexes.insert(key, indexes);
        self
    }
}

#[async_trait]
impl MetadataProvider for MockMetadata {
    async fn tables(&self, connection: &str) -> Result<Vec<String>> {
        Ok(self.tables.get(connection).cloned().unwrap_or_default())
    }

    async fn primary_keys(&self, connection: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .primary_keys
            .get(&(connection.to_string(), table.to_lowercase()))
            .cloned()
            .unwrap_or_default())
    }

    async fn index_details(&self, connection: &str, table: &str) -> Result<Vec<IndexDetailRow>> {
        Ok(self
            .indexes
            .get(&(connection.to_string(), table.to_lowercase()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Build a result from string cells; `None` becomes NULL
pub fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> TabularResult {
    TabularResult::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| CellValue::from(*cell)).collect())
            .collect(),
    )
    .unwrap()
}

/// A configuration whose source and target queries are `SELECT {key} src`
/// and `SELECT {key} tgt`
pub fn batch_config(key: &str, prefix: &str) -> BatchExportConfig {
    BatchExportConfig {
        key: key.to_string(),
        destination: Destination::Target,
        data_source: QueryConfig {
            sheet_name: "Source".to_string(),
            table_name: Some(format!("{key}_table")),
            sql: source_sql(key),
            description: format!("{key} in the legacy system"),
        },
        data_target: QueryConfig {
            sheet_name: "Target".to_string(),
            table_name: None,
            sql: target_sql(key),
            description: String::new(),
        },
        prefix: prefix.to_string(),
    }
}

pub fn source_sql(key: &str) -> String {
    format!("SELECT {key} src")
}

pub fn target_sql(key: &str) -> String {
    format!("SELECT {key} tgt")
}

/// Executor that answers both queries of every given key with a small table
pub fn executor_for_keys(keys: &[&str]) -> MockExecutor {
    keys.iter().fold(MockExecutor::new(), |executor, key| {
        executor
            .with_result(&source_sql(key), table(&["Id", "Name"], &[&[Some("1"), Some(*key)]]))
            .with_result(&target_sql(key), table(&["Id", "Name"], &[&[Some("1"), Some(*key)]]))
    })
}

/// Names of the worksheets in a workbook, in tab order
pub fn sheet_names(workbook: &[u8]) -> Vec<String> {
    let xml = zip_entry(workbook, "xl/workbook.xml");
    xml.split("<sheet ")
        .skip(1)
        .filter_map(|sheet| {
            let start = sheet.find("name=\"")? + "name=\"".len();
            let end = sheet[start..].find('"')?;
            Some(sheet[start..start + end].to_string())
        })
        .collect()
}

/// Text of one entry of a zip package
pub fn zip_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut contents = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut contents).unwrap();
    contents
}
