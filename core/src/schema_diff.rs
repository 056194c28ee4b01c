//! Primary-key and index comparison between mapped source/target tables

use crate::error::Result;
use crate::metadata::MetadataProvider;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Source table name used for target tables without a mapping
pub const NO_MAPPED_SOURCE: &str = "(no mapped source)";

/// Connection key holding the source tables
pub const SOURCE_CONNECTION: &str = "source";
/// Connection key holding the target tables
pub const TARGET_CONNECTION: &str = "target";

/// A source → target table mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    #[serde(alias = "source_table", alias = "SourceTable")]
    pub source_table: String,
    #[serde(alias = "target_table", alias = "TargetTable")]
    pub target_table: String,
}

impl TableMapping {
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
        }
    }
}

/// One raw metadata row: a single column's participation in an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDetailRow {
    pub index_name: String,
    pub column_name: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_clustered: bool,
    pub is_non_clustered: bool,
}

impl IndexDetailRow {
    /// Build a row, deriving the clustered flags from the index type name
    /// (`CLUSTERED` / `NONCLUSTERED`, case-insensitive).
    pub fn new(
        index_name: impl Into<String>,
        column_name: impl Into<String>,
        index_type: impl AsRef<str>,
        is_primary_key: bool,
        is_unique: bool,
    ) -> Self {
        let normalized = index_type.as_ref().trim().to_uppercase();
        Self {
            index_name: index_name.into(),
            column_name: column_name.into(),
            is_clustered: normalized == "CLUSTERED",
            is_non_clustered: normalized == "NONCLUSTERED",
            is_primary_key,
            is_unique,
        }
    }
}

/// An index with its columns collapsed into one display string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub index_name: String,
    pub columns_display: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_clustered: bool,
    pub is_non_clustered: bool,
}

/// Key and index metadata of one side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub primary_keys: Vec<String>,
    pub index_rows: Vec<IndexDetailRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaComparisonResult {
    pub source_table_name: String,
    pub source_primary_keys: Vec<String>,
    pub source_indexes: Vec<IndexDescriptor>,
    pub target_table_name: String,
    pub target_primary_keys: Vec<String>,
    pub target_indexes: Vec<IndexDescriptor>,
}

impl SchemaComparisonResult {
    pub fn has_mapped_source(&self) -> bool {
        self.source_table_name != NO_MAPPED_SOURCE
    }
}

pub struct SchemaDiffAnalyzer;

impl SchemaDiffAnalyzer {
    /// Group raw rows by index name, in first-seen order.
    ///
    /// Flags come from the first row of each group; the column list keeps the
    /// first occurrence of each non-empty column name.
    pub fn group_indexes(rows: &[IndexDetailRow]) -> Vec<IndexDescriptor> {
        let mut groups: IndexMap<&str, Vec<&IndexDetailRow>> = IndexMap::new();
        for row in rows {
            groups.entry(row.index_name.as_str()).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(name, members)| {
                let first = members[0];
                let mut seen = HashSet::new();
                let columns: Vec<&str> = members
                    .iter()
                    .map(|r| r.column_name.as_str())
                    .filter(|c| !c.is_empty() && seen.insert(*c))
                    .collect();

                IndexDescriptor {
                    index_name: name.to_string(),
                    columns_display: columns.join(", "),
                    is_primary_key: first.is_primary_key,
                    is_unique: first.is_unique,
                    is_clustered: first.is_clustered,
                    is_non_clustered: first.is_non_clustered,
                }
            })
            .collect()
    }

    /// Compare a mapped source/target pair
    pub fn compare(source: &TableSchema, target: &TableSchema) -> SchemaComparisonResult {
        SchemaComparisonResult {
            source_table_name: source.table_name.clone(),
            source_primary_keys: source.primary_keys.clone(),
            source_indexes: Self::group_indexes(&source.index_rows),
            target_table_name: target.table_name.clone(),
            target_primary_keys: target.primary_keys.clone(),
            target_indexes: Self::group_indexes(&target.index_rows),
        }
    }

    /// Result for a target table that has no mapped source
    pub fn compare_unmapped(target: &TableSchema) -> SchemaComparisonResult {
        SchemaComparisonResult {
            source_table_name: NO_MAPPED_SOURCE.to_string(),
            source_primary_keys: Vec::new(),
            source_indexes: Vec::new(),
            target_table_name: target.table_name.clone(),
            target_primary_keys: target.primary_keys.clone(),
            target_indexes: Self::group_indexes(&target.index_rows),
        }
    }

    /// Compare every mapping, then every target table without a mapping.
    ///
    /// Each target table appears exactly once: later mappings onto an already
    /// mapped target table are skipped.
    pub async fn analyze(
        mappings: &[TableMapping],
        provider: &dyn MetadataProvider,
    ) -> Result<Vec<SchemaComparisonResult>> {
        let mut results = Vec::new();
        let mut mapped_targets: HashSet<String> = HashSet::new();

        for mapping in mappings {
            if !mapped_targets.insert(mapping.target_table.to_lowercase()) {
                log::warn!(
                    "Skipping duplicate mapping {} -> {}: target already mapped",
                    mapping.source_table,
                    mapping.target_table
                );
                continue;
            }
            let source = Self::load_schema(provider, SOURCE_CONNECTION, &mapping.source_table).await?;
            let target = Self::load_schema(provider, TARGET_CONNECTION, &mapping.target_table).await?;
            results.push(Self::compare(&source, &target));
        }

        let all_targets = provider.tables(TARGET_CONNECTION).await?;
        for table in all_targets {
            if mapped_targets.insert(table.to_lowercase()) {
                let target = Self::load_schema(provider, TARGET_CONNECTION, &table).await?;
                results.push(Self::compare_unmapped(&target));
            }
        }

        log::info!("Schema comparison produced {} table results", results.len());
        Ok(results)
    }

    async fn load_schema(
        provider: &dyn MetadataProvider,
        connection: &str,
        table: &str,
    ) -> Result<TableSchema> {
        Ok(TableSchema {
            table_name: table.to_string(),
            primary_keys: provider.primary_keys(connection, table).await?,
            index_rows: provider.index_details(connection, table).await?,
        })
    }
}
