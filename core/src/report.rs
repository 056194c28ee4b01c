//! Grouping and paging of comparison records

use crate::comparator::{single_row_summary, AllRowsComparison, ExcludedColumns, MismatchRecord, RowComparator};
use crate::error::{MigcheckError, Result};
use crate::render::SpreadsheetRenderer;
use crate::tabular::TabularResult;
use indexmap::IndexMap;

/// Default number of groups shown per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// All records of one source row, plus a summary of the mismatching columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationGroup {
    group_key: Option<String>,
    records: Vec<MismatchRecord>,
    summary: String,
}

impl ReconciliationGroup {
    pub fn new(group_key: Option<String>, records: Vec<MismatchRecord>) -> Self {
        let mismatched: Vec<String> = records
            .iter()
            .filter(|r| !r.is_match)
            .map(MismatchRecord::display_column_name)
            .collect();
        let summary = format!("Mismatched columns: [{}]", mismatched.join(", "));
        Self {
            group_key,
            records,
            summary,
        }
    }

    pub fn group_key(&self) -> Option<&str> {
        self.group_key.as_deref()
    }

    pub fn records(&self) -> &[MismatchRecord] {
        &self.records
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn mismatch_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_match).count()
    }
}

/// Paged view over reconciliation groups.
///
/// Paging only affects what [`page`](Self::page) returns; exports always use
/// the full group list.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    groups: Vec<ReconciliationGroup>,
    summary: String,
    page_size: usize,
    current_page: usize,
}

impl ReconciliationReport {
    /// Group records by key in first-seen order. Records without a key are dropped.
    pub fn from_records(records: Vec<MismatchRecord>, summary: impl Into<String>) -> Self {
        let mut grouped: IndexMap<String, Vec<MismatchRecord>> = IndexMap::new();
        for record in records {
            if let Some(key) = record.group_key.clone().filter(|k| !k.is_empty()) {
                grouped.entry(key).or_default().push(record);
            }
        }

        let groups = grouped
            .into_iter()
            .map(|(key, records)| ReconciliationGroup::new(Some(key), records))
            .collect();

        Self::from_groups(groups, summary)
    }

    pub fn from_comparison(comparison: AllRowsComparison) -> Self {
        let summary = comparison.summary();
        Self::from_records(comparison.records, summary)
    }

    /// Report for one row. A row outside either result gives an empty report
    /// whose summary names the row counts; other errors are passed through.
    pub fn from_single_row(
        source: &TabularResult,
        target: &TabularResult,
        index: i64,
        excluded: &ExcludedColumns,
    ) -> Result<Self> {
        match RowComparator::compare_row(source, target, index, excluded) {
            Ok(group) => {
                let summary = single_row_summary(&group);
                Ok(Self::from_groups(vec![group], summary))
            }
            Err(MigcheckError::OutOfRange {
                index,
                source_rows,
                target_rows,
            }) => {
                log::warn!("Row {index} is outside the query results");
                Ok(Self::from_groups(
                    Vec::new(),
                    format!(
                        "Cannot validate row {}: source has {source_rows} rows, target has {target_rows} rows.",
                        index + 1
                    ),
                ))
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_groups(groups: Vec<ReconciliationGroup>, summary: impl Into<String>) -> Self {
        Self {
            groups,
            summary: summary.into(),
            page_size: DEFAULT_PAGE_SIZE,
            current_page: 1,
        }
    }

    /// Change the page size (minimum 1) and return to the first page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.current_page = 1;
        self
    }

    pub fn groups(&self) -> &[ReconciliationGroup] {
        &self.groups
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// `max(1, ceil(groups / page_size))`
    pub fn total_pages(&self) -> usize {
        self.groups.len().div_ceil(self.page_size).max(1)
    }

    pub fn page_info(&self) -> String {
        format!("Page {} of {}", self.current_page, self.total_pages())
    }

    /// Groups on the current page
    pub fn page(&self) -> &[ReconciliationGroup] {
        let start = ((self.current_page - 1) * self.page_size).min(self.groups.len());
        let end = (start + self.page_size).min(self.groups.len());
        &self.groups[start..end]
    }

    pub fn can_go_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Advance one page; a no-op on the last page. Returns whether the page changed.
    pub fn next_page(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Go back one page; a no-op on the first page. Returns whether the page changed.
    pub fn previous_page(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Jump to a 1-based page; out-of-range pages leave the view unchanged
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page == 0 || page > self.total_pages() || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn total_mismatches(&self) -> usize {
        self.groups.iter().map(ReconciliationGroup::mismatch_count).sum()
    }

    pub fn can_export(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Render every group (not only the current page) as a validation workbook
    pub fn export_workbook(&self) -> Result<Vec<u8>> {
        SpreadsheetRenderer::render_validation_report(&self.groups)
    }
}
