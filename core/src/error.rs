//! Error types for migcheck

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigcheckError>;

#[derive(Debug, Error)]
pub enum MigcheckError {
    /// The named connection is not configured or could not be attached
    #[error("Connection '{key}' is not available: {message}")]
    Connection { key: String, message: String },

    /// SQL execution failed on an attached connection
    #[error("Query failed on '{connection}': {message}\nSQL: {sql}")]
    Query {
        connection: String,
        sql: String,
        message: String,
    },

    #[error(
        "Row index {index} is out of range (source has {source_rows} rows, target has {target_rows} rows)"
    )]
    OutOfRange {
        index: i64,
        source_rows: usize,
        target_rows: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Spreadsheet rendering failed: {0}")]
    Render(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MigcheckError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn connection(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn query(
        connection: impl Into<String>,
        sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Query {
            connection: connection.into(),
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// True for the cooperative cancellation signal, as opposed to a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<rust_xlsxwriter::XlsxError> for MigcheckError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<zip::result::ZipError> for MigcheckError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_sql() {
        let err = MigcheckError::query("target", "SELECT * FROM Users", "no such table");
        let message = err.to_string();
        assert!(message.contains("target"));
        assert!(message.contains("SELECT * FROM Users"));
        assert!(message.contains("no such table"));
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(MigcheckError::Cancelled.is_cancelled());
        assert!(!MigcheckError::invalid_input("bad").is_cancelled());
    }
}
