//! Schema comparison against mock metadata

use migcheck_core::config::MetadataConfig;
use migcheck_core::metadata::{ExecutorMetadataProvider, MetadataProvider};
use migcheck_core::render::SpreadsheetRenderer;
use migcheck_core::schema_diff::{
    IndexDetailRow, SchemaDiffAnalyzer, TableMapping, NO_MAPPED_SOURCE, SOURCE_CONNECTION,
    TARGET_CONNECTION,
};

mod common;
use common::{sheet_names, table, zip_entry, MockExecutor, MockMetadata};
use std::sync::Arc;

fn metadata() -> MockMetadata {
    MockMetadata::new()
        .with_table(
            SOURCE_CONNECTION,
            "tblUser",
            &["UserId"],
            vec![IndexDetailRow::new("PK_tblUser", "UserId", "CLUSTERED", true, true)],
        )
        .with_table(
            TARGET_CONNECTION,
            "users",
            &["id"],
            vec![
                IndexDetailRow::new("PK_users", "id", "CLUSTERED", true, true),
                IndexDetailRow::new("IX1", "ColA", "NONCLUSTERED", false, false),
                IndexDetailRow::new("IX1", "ColB", "NONCLUSTERED", false, false),
            ],
        )
        .with_table(TARGET_CONNECTION, "audit_log", &[], vec![])
}

#[tokio::test]
async fn test_mapped_then_unmapped_tables() {
    let mappings = vec![TableMapping::new("tblUser", "users")];

    let results = SchemaDiffAnalyzer::analyze(&mappings, &metadata()).await.unwrap();

    assert_eq!(results.len(), 2);
    let users = &results[0];
    assert!(users.has_mapped_source());
    assert_eq!(users.source_primary_keys, vec!["UserId"]);
    assert_eq!(users.target_indexes.len(), 2);
    assert_eq!(users.target_indexes[1].index_name, "IX1");
    assert_eq!(users.target_indexes[1].columns_display, "ColA, ColB");
    assert!(users.target_indexes[1].is_non_clustered);

    let audit = &results[1];
    assert_eq!(audit.source_table_name, NO_MAPPED_SOURCE);
    assert!(!audit.has_mapped_source());
    assert!(audit.source_indexes.is_empty());
    assert_eq!(audit.target_table_name, "audit_log");
}

#[tokio::test]
async fn test_each_target_table_reported_once() {
    let mappings = vec![
        TableMapping::new("tblUser", "users"),
        TableMapping::new("tblUserArchive", "USERS"),
    ];

    let results = SchemaDiffAnalyzer::analyze(&mappings, &metadata()).await.unwrap();

    let targets: Vec<_> = results.iter().map(|r| r.target_table_name.as_str()).collect();
    assert_eq!(targets, vec!["users", "audit_log"]);
}

#[tokio::test]
async fn test_schema_workbook_sheets() {
    let mappings = vec![TableMapping::new("tblUser", "users")];
    let results = SchemaDiffAnalyzer::analyze(&mappings, &metadata()).await.unwrap();

    let workbook = SpreadsheetRenderer::render_schema_comparison(&results).unwrap();

    assert_eq!(sheet_names(&workbook), vec!["Table Comparison", "Index Details"]);
    let strings = zip_entry(&workbook, "xl/sharedStrings.xml");
    assert!(strings.contains("Source: tblUser"));
    assert!(strings.contains("Target: audit_log"));
    assert!(strings.contains("ColA, ColB"));
}

#[tokio::test]
async fn test_index_detail_columns_read_by_position() {
    let queries = MetadataConfig::default();
    let executor = MockExecutor::new().with_result(
        &queries.index_details_query("users"),
        table(
            &["name", "column", "type", "pk", "unique"],
            &[
                &[Some("PK_users"), Some("id"), Some("clustered"), Some("true"), Some("1")],
                &[Some("IX_email"), Some("email"), Some("NONCLUSTERED"), Some("0"), None],
            ],
        ),
    );
    let provider = ExecutorMetadataProvider::new(Arc::new(executor), queries);

    let rows = provider.index_details(TARGET_CONNECTION, "users").await.unwrap();

    assert_eq!(
        rows,
        vec![
            IndexDetailRow::new("PK_users", "id", "CLUSTERED", true, true),
            IndexDetailRow::new("IX_email", "email", "NONCLUSTERED", false, false),
        ]
    );
    assert!(rows[0].is_clustered);
    assert!(rows[1].is_non_clustered);
}
