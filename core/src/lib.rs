//! # migcheck-core
//!
//! Core library for migcheck - a database migration verification tool that
//! runs matching queries against a source and a target database, reconciles
//! the results row by row and column by column, compares key and index
//! metadata, and exports spreadsheets for manual audit.
//!
//! This crate provides the core functionality that can be used by different
//! interfaces (CLI, services, etc.).

pub mod batch_config;
pub mod comparator;
pub mod config;
pub mod coverage;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod report;
pub mod schema_diff;
pub mod sink;
pub mod tabular;

// Re-export the most commonly used types for convenience
pub use batch_config::{BatchExportConfig, ConfigStore, Destination, QueryConfig};
pub use comparator::{ExcludedColumns, MismatchRecord, RowComparator, RowSelector};
pub use config::Config;
pub use error::{MigcheckError, Result};
pub use executor::{DuckDbQueryExecutor, QueryExecutor};
pub use pipeline::BatchExportPipeline;
pub use progress::{BatchOutcome, BatchProgress, CancellationFlag, EntryStatus, NoProgress};
pub use render::{SheetPayload, SpreadsheetRenderer};
pub use report::{ReconciliationGroup, ReconciliationReport};
pub use schema_diff::{SchemaComparisonResult, SchemaDiffAnalyzer};
pub use sink::{ArchiveSink, ArtifactSink, DirectorySink};
pub use tabular::{CellValue, TabularResult};

use indexmap::IndexMap;

/// Compare one row of two results; every non-excluded aligned column is reported
pub fn compare_row(
    source: &TabularResult,
    target: &TabularResult,
    row_index: i64,
    excluded: &ExcludedColumns,
) -> Result<ReconciliationGroup> {
    RowComparator::compare_row(source, target, row_index, excluded)
}

/// Compare all overlapping rows and group the mismatches.
///
/// Returns the groups, the total mismatch count and a summary line.
pub fn compare_all(
    source: &TabularResult,
    target: &TabularResult,
    excluded: &ExcludedColumns,
) -> (Vec<ReconciliationGroup>, usize, String) {
    let comparison = RowComparator::compare_all(source, target, excluded);
    let total = comparison.total_mismatches();
    let report = ReconciliationReport::from_comparison(comparison);
    let summary = report.summary().to_string();
    (report.groups().to_vec(), total, summary)
}

/// Render one worksheet per entry, in order
pub fn render_workbook(sheets: &IndexMap<String, SheetPayload>) -> Result<Vec<u8>> {
    SpreadsheetRenderer::render_workbook(sheets)
}
