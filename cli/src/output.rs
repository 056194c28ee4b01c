//! Output formatting utilities

use migcheck_core::batch_config::BatchExportConfig;
use migcheck_core::coverage::FieldCoverage;
use migcheck_core::error::Result;
use migcheck_core::progress::BatchOutcome;
use migcheck_core::report::ReconciliationReport;
use migcheck_core::schema_diff::{IndexDescriptor, SchemaComparisonResult};

/// Pretty printer for migcheck output
pub struct PrettyPrinter;

fn branch(index: usize, len: usize) -> &'static str {
    if index == len - 1 {
        "└─"
    } else {
        "├─"
    }
}

impl PrettyPrinter {
    /// Print stored configurations
    pub fn print_config_list(configs: &[&BatchExportConfig]) {
        if configs.is_empty() {
            println!("No configurations found.");
            return;
        }

        println!("📋 Export Configurations:");
        for (i, config) in configs.iter().enumerate() {
            let marker = if config.is_missing_description() { " ⚠️  missing description" } else { "" };
            println!(
                "{} {}) {} [{} -> {}] ({}){}",
                branch(i, configs.len()),
                config.prefix,
                config.key,
                config.data_source.sheet_name,
                config.data_target.sheet_name,
                config.destination.connection_key(),
                marker
            );
        }
    }

    /// Print the current page of a reconciliation report
    pub fn print_report(report: &ReconciliationReport) {
        println!("🔍 {}", report.summary());
        if report.groups().is_empty() {
            return;
        }
        println!("{}", report.page_info());

        for group in report.page() {
            println!();
            println!("{} - {}", group.group_key().unwrap_or("(no key)"), group.summary());
            let records = group.records();
            for (i, record) in records.iter().enumerate() {
                let glyph = if record.is_match { "✅" } else { "❌" };
                println!(
                    "{} {} {}: {} | {}",
                    branch(i, records.len()),
                    glyph,
                    record.display_column_name(),
                    record.source_value,
                    record.target_value
                );
            }
        }
    }

    pub fn print_schema_results(results: &[SchemaComparisonResult]) {
        if results.is_empty() {
            println!("No tables compared.");
            return;
        }

        println!("🗂️  Schema Comparison:");
        for (i, result) in results.iter().enumerate() {
            println!(
                "{} {} -> {}",
                branch(i, results.len()),
                result.source_table_name,
                result.target_table_name
            );
            let indent = if i == results.len() - 1 { "   " } else { "│  " };
            println!(
                "{indent}├─ Primary keys: {} | {}",
                result.source_primary_keys.join(", "),
                result.target_primary_keys.join(", ")
            );
            println!(
                "{indent}└─ Indexes: {} | {}",
                index_names(&result.source_indexes),
                index_names(&result.target_indexes)
            );
        }
    }

    pub fn print_coverage(coverage: &[FieldCoverage]) {
        if coverage.is_empty() {
            println!("No comparison reports found.");
            return;
        }

        println!("📊 Field Coverage:");
        for (i, table) in coverage.iter().enumerate() {
            println!(
                "{} {}: {} fields, {} only in database, {} only in JSON",
                branch(i, coverage.len()),
                table.table_name,
                table.items.len(),
                table.db_only_count,
                table.json_only_count
            );
        }
    }

    pub fn print_missing_tables(tables: &[String]) {
        if tables.is_empty() {
            println!("✅ Every target table is present in the list.");
            return;
        }

        println!("📋 Target tables missing from the list ({}):", tables.len());
        for (i, table) in tables.iter().enumerate() {
            println!("{} {table}", branch(i, tables.len()));
        }
    }

    pub fn print_batch_outcome(outcome: BatchOutcome, location: &str) {
        match outcome {
            BatchOutcome::Succeeded => println!("✅ Export finished: {location}"),
            BatchOutcome::PartiallySucceeded => {
                println!("⚠️  Export finished with failures, see the log for details: {location}")
            }
            BatchOutcome::Cancelled => println!("🛑 Export cancelled"),
        }
    }
}

fn index_names(indexes: &[IndexDescriptor]) -> String {
    if indexes.is_empty() {
        return "-".to_string();
    }
    indexes
        .iter()
        .map(|index| format!("{}({})", index.index_name, index.columns_display))
        .collect::<Vec<_>>()
        .join(", ")
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_configs(configs: &[&BatchExportConfig]) -> Result<String> {
        Ok(serde_json::to_string_pretty(configs)?)
    }
}
