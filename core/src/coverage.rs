//! Field coverage between database tables and JSON field lists, and
//! detection of target tables missing from a source list

use crate::error::{MigcheckError, Result};
use crate::render::{RecordSet, SheetPayload, SpreadsheetRenderer};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A stored field comparison for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    #[serde(alias = "TableName")]
    pub table_name: String,
    #[serde(alias = "JsonFields", default)]
    pub json_fields: Vec<String>,
    #[serde(alias = "DbFields", default)]
    pub db_fields: Vec<String>,
    #[serde(alias = "ComparisonDate", default)]
    pub comparison_date: Option<DateTime<Utc>>,
}

/// Whether one database field is present in the JSON field list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCoverageItem {
    pub field_name: String,
    pub is_in_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCoverage {
    pub table_name: String,
    /// Database fields in name order
    pub items: Vec<FieldCoverageItem>,
    pub db_only_count: usize,
    pub json_only_count: usize,
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
}

impl ComparisonReport {
    /// Compare the database fields with the JSON fields, ignoring case
    pub fn coverage(&self) -> FieldCoverage {
        let json = lowercase_set(&self.json_fields);
        let db = lowercase_set(&self.db_fields);

        let mut fields = self.db_fields.clone();
        sort_names(&mut fields);
        let items = fields
            .into_iter()
            .map(|field_name| {
                let is_in_json = json.contains(&field_name.to_lowercase());
                FieldCoverageItem {
                    field_name,
                    is_in_json,
                }
            })
            .collect();

        FieldCoverage {
            table_name: self.table_name.clone(),
            items,
            db_only_count: db.difference(&json).count(),
            json_only_count: json.difference(&db).count(),
        }
    }
}

/// One sheet per table, listing every database field with its JSON status.
/// Two reports for the same table (ignoring case) are rejected.
pub fn render_coverage_workbook(reports: &[ComparisonReport]) -> Result<Vec<u8>> {
    let mut sheets: IndexMap<String, SheetPayload> = IndexMap::new();
    for report in reports {
        let coverage = report.coverage();
        log::debug!(
            "{}: {} db-only, {} json-only fields",
            coverage.table_name,
            coverage.db_only_count,
            coverage.json_only_count
        );
        if sheets
            .keys()
            .any(|name| name.to_lowercase() == coverage.table_name.to_lowercase())
        {
            return Err(MigcheckError::invalid_input(format!(
                "Duplicate coverage sheet name '{}'",
                coverage.table_name
            )));
        }
        sheets.insert(
            coverage.table_name,
            SheetPayload::Records(RecordSet::FieldCoverage(coverage.items)),
        );
    }
    SpreadsheetRenderer::render_workbook(&sheets)
}

/// Target tables absent from the source list (ignoring case), sorted and distinct
pub fn missing_tables(target_tables: &[String], source_tables: &[String]) -> Vec<String> {
    let mut seen = lowercase_set(source_tables);
    let mut missing: Vec<String> = target_tables
        .iter()
        .filter(|t| seen.insert(t.to_lowercase()))
        .cloned()
        .collect();
    sort_names(&mut missing);
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_coverage_is_case_insensitive() {
        let report = ComparisonReport {
            table_name: "Users".to_string(),
            json_fields: strings(&["id", "NAME", "extra"]),
            db_fields: strings(&["Name", "Id", "CreatedAt"]),
            comparison_date: None,
        };
        let coverage = report.coverage();

        let names: Vec<_> = coverage.items.iter().map(|i| i.field_name.as_str()).collect();
        assert_eq!(names, vec!["CreatedAt", "Id", "Name"]);
        assert!(!coverage.items[0].is_in_json);
        assert!(coverage.items[1].is_in_json);
        assert_eq!(coverage.db_only_count, 1);
        assert_eq!(coverage.json_only_count, 1);
    }

    #[test]
    fn test_missing_tables() {
        let target = strings(&["Users", "orders", "Audit", "Archive", "audit"]);
        let source = strings(&["users", "ORDERS"]);
        assert_eq!(missing_tables(&target, &source), vec!["Archive", "Audit"]);
    }

    #[test]
    fn test_duplicate_table_names_rejected() {
        let report = |name: &str| ComparisonReport {
            table_name: name.to_string(),
            json_fields: strings(&["id"]),
            db_fields: strings(&["Id"]),
            comparison_date: None,
        };

        let result = render_coverage_workbook(&[report("Users"), report("Orders"), report("USERS")]);
        assert!(matches!(result, Err(MigcheckError::InvalidInput(msg)) if msg.contains("USERS")));
        assert!(render_coverage_workbook(&[report("Users"), report("Orders")]).is_ok());
    }

    #[test]
    fn test_report_accepts_pascal_case_json() {
        let report: ComparisonReport = serde_json::from_str(
            r#"{"TableName": "Users", "JsonFields": ["id"], "DbFields": ["Id"]}"#,
        )
        .unwrap();
        assert_eq!(report.table_name, "Users");
        assert!(report.coverage().items[0].is_in_json);
    }
}
