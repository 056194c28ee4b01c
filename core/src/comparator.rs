//! Positional row/column comparison between a source and a target result
//!
//! Columns are aligned by position, not by name: the source column at
//! position `i` is compared with the target column at position `i`, up to the
//! narrower of the two results. Cell values are compared as canonical text
//! (see [`CellValue::canonical`]) so the audit reflects what an exported
//! sheet would literally show.

use crate::error::{MigcheckError, Result};
use crate::report::ReconciliationGroup;
use crate::tabular::{CellValue, TabularResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placeholder shown when a column name is missing on one side
pub const EMPTY_COLUMN_PLACEHOLDER: &str = "(empty)";

/// One column-level comparison outcome within a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub source_column_name: String,
    pub target_column_name: String,
    pub source_value: String,
    pub target_value: String,
    pub is_match: bool,
    pub group_key: Option<String>,
}

impl MismatchRecord {
    pub fn new(
        source_column_name: impl Into<String>,
        target_column_name: impl Into<String>,
        source_value: impl Into<String>,
        target_value: impl Into<String>,
        group_key: Option<String>,
    ) -> Self {
        let source_value = source_value.into();
        let target_value = target_value.into();
        let is_match = source_value == target_value;
        Self {
            source_column_name: source_column_name.into(),
            target_column_name: target_column_name.into(),
            source_value,
            target_value,
            is_match,
            group_key,
        }
    }

    /// `"{source} / {target}"`, with a placeholder for a missing name
    pub fn display_column_name(&self) -> String {
        format!(
            "{} / {}",
            name_or_placeholder(&self.source_column_name),
            name_or_placeholder(&self.target_column_name)
        )
    }
}

fn name_or_placeholder(name: &str) -> &str {
    if name.trim().is_empty() {
        EMPTY_COLUMN_PLACEHOLDER
    } else {
        name
    }
}

/// Case-insensitive set of target column names to skip.
///
/// Owned by the caller and passed by reference into each comparison; the
/// comparator never keeps it beyond one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedColumns {
    names: HashSet<String>,
}

impl ExcludedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exclude every column of `all_columns` that is not in `included`
    pub fn from_included<'a>(
        all_columns: impl IntoIterator<Item = &'a str>,
        included: &[String],
    ) -> Self {
        let included: HashSet<String> = included.iter().map(|c| c.to_lowercase()).collect();
        let mut excluded = Self::new();
        for column in all_columns {
            if !included.contains(&column.to_lowercase()) {
                excluded.insert(column);
            }
        }
        excluded
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExcludedColumns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut excluded = Self::new();
        for name in iter {
            excluded.insert(name.as_ref());
        }
        excluded
    }
}

/// Which row a single-row comparison should look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSelector {
    First,
    /// `source_rows / 2`
    Middle,
    Last,
    Index(usize),
}

impl RowSelector {
    /// Resolve against the source row count. Negative positions (e.g. `Last`
    /// on an empty source) are returned as such so the range check rejects them.
    pub fn resolve(&self, source_rows: usize) -> i64 {
        match self {
            RowSelector::First => 0,
            RowSelector::Middle => (source_rows / 2) as i64,
            RowSelector::Last => source_rows as i64 - 1,
            RowSelector::Index(index) => *index as i64,
        }
    }
}

impl std::str::FromStr for RowSelector {
    type Err = MigcheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(RowSelector::First),
            "middle" => Ok(RowSelector::Middle),
            "last" => Ok(RowSelector::Last),
            other => other.parse::<usize>().map(RowSelector::Index).map_err(|_| {
                MigcheckError::invalid_input(format!(
                    "Row must be 'first', 'middle', 'last' or a 0-based index, got '{s}'"
                ))
            }),
        }
    }
}

/// Flat output of an all-rows comparison, mismatches only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllRowsComparison {
    pub records: Vec<MismatchRecord>,
    /// `min(source_rows, target_rows)`
    pub rows_compared: usize,
    /// Aligned column positions that were not excluded
    pub columns_compared: usize,
    /// Distinct rows with at least one mismatch
    pub rows_with_mismatches: usize,
    /// Source rows past the end of the target, never compared
    pub ignored_source_rows: usize,
    /// Target rows past the end of the source, never compared
    pub ignored_target_rows: usize,
}

impl AllRowsComparison {
    pub fn total_mismatches(&self) -> usize {
        self.records.len()
    }

    pub fn ignored_tail_rows(&self) -> usize {
        self.ignored_source_rows + self.ignored_target_rows
    }

    pub fn summary(&self) -> String {
        let mut summary = if self.records.is_empty() {
            format!(
                "Validation passed: compared {} rows and {} columns, all data (excluding skipped columns) matches.",
                self.rows_compared, self.columns_compared
            )
        } else {
            format!(
                "Validation finished: compared {} rows and {} columns, found {} mismatches in {} rows.",
                self.rows_compared,
                self.columns_compared,
                self.records.len(),
                self.rows_with_mismatches
            )
        };
        if self.ignored_tail_rows() > 0 {
            summary.push_str(&format!(
                " {} unmatched tail rows were not compared (source extra: {}, target extra: {}).",
                self.ignored_tail_rows(),
                self.ignored_source_rows,
                self.ignored_target_rows
            ));
        }
        summary
    }
}

/// Stateless comparator over two results
pub struct RowComparator;

impl RowComparator {
    /// Compare one row, emitting a record for every non-excluded aligned column
    /// (matches included) under the group key `Row {index + 1}`.
    pub fn compare_row(
        source: &TabularResult,
        target: &TabularResult,
        index: i64,
        excluded: &ExcludedColumns,
    ) -> Result<ReconciliationGroup> {
        if index < 0 || index as usize >= source.row_count() || index as usize >= target.row_count()
        {
            return Err(MigcheckError::OutOfRange {
                index,
                source_rows: source.row_count(),
                target_rows: target.row_count(),
            });
        }

        let row = index as usize;
        let group_key = row_group_key(row);
        let records = Self::aligned_columns(source, target, excluded)
            .map(|(position, source_name, target_name)| {
                MismatchRecord::new(
                    source_name,
                    target_name,
                    canonical_cell(source, row, position),
                    canonical_cell(target, row, position),
                    Some(group_key.clone()),
                )
            })
            .collect();

        Ok(ReconciliationGroup::new(Some(group_key), records))
    }

    /// Compare every overlapping row, emitting records only for mismatches.
    ///
    /// Rows beyond the shorter result are not compared; their counts are
    /// reported in [`AllRowsComparison`] instead.
    pub fn compare_all(
        source: &TabularResult,
        target: &TabularResult,
        excluded: &ExcludedColumns,
    ) -> AllRowsComparison {
        let rows_compared = source.row_count().min(target.row_count());
        let columns: Vec<(usize, &str, &str)> =
            Self::aligned_columns(source, target, excluded).collect();

        let mut records = Vec::new();
        let mut rows_with_mismatches = 0;

        for row in 0..rows_compared {
            let mut row_has_mismatch = false;
            for &(position, source_name, target_name) in &columns {
                let source_value = canonical_cell(source, row, position);
                let target_value = canonical_cell(target, row, position);
                if source_value != target_value {
                    row_has_mismatch = true;
                    records.push(MismatchRecord::new(
                        source_name,
                        target_name,
                        source_value,
                        target_value,
                        Some(row_group_key(row)),
                    ));
                }
            }
            if row_has_mismatch {
                rows_with_mismatches += 1;
            }
        }

        if source.row_count() != target.row_count() {
            log::warn!(
                "Row counts differ (source {}, target {}); only the first {} rows were compared",
                source.row_count(),
                target.row_count(),
                rows_compared
            );
        }

        AllRowsComparison {
            records,
            rows_compared,
            columns_compared: columns.len(),
            rows_with_mismatches,
            ignored_source_rows: source.row_count() - rows_compared,
            ignored_target_rows: target.row_count() - rows_compared,
        }
    }

    /// Column positions shared by both sides whose target name is not excluded
    fn aligned_columns<'a>(
        source: &'a TabularResult,
        target: &'a TabularResult,
        excluded: &'a ExcludedColumns,
    ) -> impl Iterator<Item = (usize, &'a str, &'a str)> + 'a {
        source
            .columns()
            .iter()
            .zip(target.columns().iter())
            .enumerate()
            .filter(move |(_, (_, target_name))| !excluded.contains(target_name))
            .map(|(position, (source_name, target_name))| {
                (position, source_name.as_str(), target_name.as_str())
            })
    }
}

/// Summary line for a single-row comparison
pub fn single_row_summary(group: &ReconciliationGroup) -> String {
    let key = group.group_key().unwrap_or("row");
    let compared = group.records().len();
    let mismatches = group.mismatch_count();
    if mismatches == 0 {
        format!(
            "Validation passed: all {compared} columns of {key} (excluding skipped columns) match."
        )
    } else {
        format!("Validation finished: found {mismatches} mismatches in {compared} columns of {key}.")
    }
}

fn row_group_key(row: usize) -> String {
    format!("Row {}", row + 1)
}

fn canonical_cell(result: &TabularResult, row: usize, column: usize) -> String {
    result
        .cell(row, column)
        .map(CellValue::canonical)
        .unwrap_or_else(|| CellValue::Null.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> TabularResult {
        TabularResult::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| CellValue::from(*v)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_compare_row_emits_matches_and_mismatches() {
        let a = table(&["Id", "Name"], &[&["1", "Alice"]]);
        let b = table(&["Id", "Name"], &[&["1", "Bob"]]);

        let group = RowComparator::compare_row(&a, &b, 0, &ExcludedColumns::new()).unwrap();
        let records = group.records();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            MismatchRecord::new("Id", "Id", "1", "1", Some("Row 1".to_string()))
        );
        assert!(records[0].is_match);
        assert_eq!(records[1].source_value, "Alice");
        assert_eq!(records[1].target_value, "Bob");
        assert!(!records[1].is_match);
        assert_eq!(group.group_key(), Some("Row 1"));
        assert!(group.summary().contains("Name"));
        assert!(!group.summary().contains("Id"));
    }

    #[test]
    fn test_compare_row_out_of_range() {
        let a = table(&["Id"], &[&["1"], &["2"]]);
        let b = table(&["Id"], &[&["1"]]);
        let excluded = ExcludedColumns::new();

        assert!(matches!(
            RowComparator::compare_row(&a, &b, 1, &excluded),
            Err(MigcheckError::OutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            RowComparator::compare_row(&a, &b, -1, &excluded),
            Err(MigcheckError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_exclusions_are_case_insensitive_and_target_based() {
        let a = table(&["Id", "Created"], &[&["1", "2024-01-01"]]);
        let b = table(&["Id", "CreatedAt"], &[&["1", "2024-01-02"]]);
        let excluded: ExcludedColumns = ["createdat"].into_iter().collect();

        let group = RowComparator::compare_row(&a, &b, 0, &excluded).unwrap();
        assert_eq!(group.records().len(), 1);
        assert_eq!(group.records()[0].target_column_name, "Id");

        let all = RowComparator::compare_all(&a, &b, &excluded);
        assert_eq!(all.total_mismatches(), 0);
        assert_eq!(all.columns_compared, 1);
    }

    #[test]
    fn test_no_type_coercion() {
        let a = table(&["Amount"], &[&["1"]]);
        let b = table(&["Amount"], &[&["1.0"]]);
        let all = RowComparator::compare_all(&a, &b, &ExcludedColumns::new());
        assert_eq!(all.total_mismatches(), 1);
    }

    #[test]
    fn test_null_placeholder_compared_as_text() {
        let a = TabularResult::new(vec!["Note".to_string()], vec![vec![CellValue::Null]]).unwrap();
        let b = table(&["Note"], &[&["(null)"]]);
        let group = RowComparator::compare_row(&a, &b, 0, &ExcludedColumns::new()).unwrap();
        assert!(group.records()[0].is_match);
    }

    #[test]
    fn test_compare_all_counts_and_tail() {
        let a = table(
            &["Id", "Name", "City"],
            &[&["1", "Alice", "Oslo"], &["2", "Bob", "Rome"], &["3", "Cy", "Paris"]],
        );
        let b = table(&["Id", "Name"], &[&["1", "Alice"], &["2", "Rob"]]);

        let all = RowComparator::compare_all(&a, &b, &ExcludedColumns::new());
        assert_eq!(all.rows_compared, 2);
        assert_eq!(all.columns_compared, 2);
        assert_eq!(all.total_mismatches(), 1);
        assert_eq!(all.rows_with_mismatches, 1);
        assert_eq!(all.ignored_source_rows, 1);
        assert_eq!(all.ignored_target_rows, 0);
        assert_eq!(all.records[0].group_key.as_deref(), Some("Row 2"));
        assert!(all.summary().contains("1 unmatched tail rows"));
    }

    #[test]
    fn test_compare_all_is_deterministic() {
        let a = table(&["A", "B"], &[&["1", "x"], &["2", "y"]]);
        let b = table(&["A", "B"], &[&["9", "z"], &["2", "q"]]);
        let excluded = ExcludedColumns::new();

        let first = RowComparator::compare_all(&a, &b, &excluded);
        let second = RowComparator::compare_all(&a, &b, &excluded);
        assert_eq!(first, second);
        let order: Vec<(&str, &str)> = first
            .records
            .iter()
            .map(|r| (r.group_key.as_deref().unwrap(), r.source_column_name.as_str()))
            .collect();
        assert_eq!(order, vec![("Row 1", "A"), ("Row 1", "B"), ("Row 2", "B")]);
    }

    #[test]
    fn test_row_selector() {
        assert_eq!(RowSelector::First.resolve(10), 0);
        assert_eq!(RowSelector::Middle.resolve(10), 5);
        assert_eq!(RowSelector::Last.resolve(10), 9);
        assert_eq!(RowSelector::Last.resolve(0), -1);
        assert_eq!("middle".parse::<RowSelector>().unwrap(), RowSelector::Middle);
        assert_eq!("12".parse::<RowSelector>().unwrap(), RowSelector::Index(12));
        assert!("twelve".parse::<RowSelector>().is_err());
    }

    #[test]
    fn test_display_column_name_placeholder() {
        let record = MismatchRecord::new("", "Name", "a", "b", None);
        assert_eq!(record.display_column_name(), "(empty) / Name");
    }

    #[test]
    fn test_excluded_from_included() {
        let all = ["Id", "Name", "Updated"];
        let excluded = ExcludedColumns::from_included(all, &["id".to_string(), "NAME".to_string()]);
        assert_eq!(excluded.len(), 1);
        assert!(excluded.contains("updated"));
    }
}
