//! Table, primary-key and index metadata lookups

use crate::config::MetadataConfig;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::schema_diff::IndexDetailRow;
use crate::tabular::{CellValue, TabularResult};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Names of all user tables on a connection
    async fn tables(&self, connection: &str) -> Result<Vec<String>>;

    /// Primary-key column names of a table, in key order
    async fn primary_keys(&self, connection: &str, table: &str) -> Result<Vec<String>>;

    /// One row per (index, column) pair of a table
    async fn index_details(&self, connection: &str, table: &str) -> Result<Vec<IndexDetailRow>>;
}

/// Reads metadata by running the configured SQL templates through a query executor
pub struct ExecutorMetadataProvider {
    executor: Arc<dyn QueryExecutor>,
    queries: MetadataConfig,
}

impl ExecutorMetadataProvider {
    pub fn new(executor: Arc<dyn QueryExecutor>, queries: MetadataConfig) -> Self {
        Self { executor, queries }
    }
}

fn text(cell: Option<&CellValue>) -> String {
    match cell {
        Some(CellValue::Null) | None => String::new(),
        Some(value) => value.to_string(),
    }
}

fn flag(cell: Option<&CellValue>) -> bool {
    match cell {
        Some(CellValue::Boolean(b)) => *b,
        Some(CellValue::Integer(i)) => *i != 0,
        Some(CellValue::String(s)) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

fn first_column(result: &TabularResult) -> Vec<String> {
    (0..result.row_count())
        .map(|row| text(result.cell(row, 0)))
        .filter(|name| !name.is_empty())
        .collect()
}

#[async_trait]
impl MetadataProvider for ExecutorMetadataProvider {
    async fn tables(&self, connection: &str) -> Result<Vec<String>> {
        let result = self.executor.execute(&self.queries.tables_sql, connection).await?;
        Ok(first_column(&result))
    }

    async fn primary_keys(&self, connection: &str, table: &str) -> Result<Vec<String>> {
        let sql = self.queries.primary_keys_query(table);
        let result = self.executor.execute(&sql, connection).await?;
        Ok(first_column(&result))
    }

    async fn index_details(&self, connection: &str, table: &str) -> Result<Vec<IndexDetailRow>> {
        let sql = self.queries.index_details_query(table);
        let result = self.executor.execute(&sql, connection).await?;

        let rows = (0..result.row_count())
            .map(|row| {
                IndexDetailRow::new(
                    text(result.cell(row, 0)),
                    text(result.cell(row, 1)),
                    text(result.cell(row, 2)),
                    flag(result.cell(row, 3)),
                    flag(result.cell(row, 4)),
                )
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert!(flag(Some(&CellValue::Boolean(true))));
        assert!(flag(Some(&CellValue::Integer(1))));
        assert!(flag(Some(&CellValue::from("TRUE"))));
        assert!(!flag(Some(&CellValue::from("0"))));
        assert!(!flag(Some(&CellValue::Null)));
        assert!(!flag(None));
    }
}
