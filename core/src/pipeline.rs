//! Batch export of configured source/target query pairs
//!
//! Entries run one after another; the two queries of one entry run
//! concurrently. A failing entry is logged and reported, and the batch moves
//! on. Cancellation is checked before each entry and ends the batch with
//! [`MigcheckError::Cancelled`].

use crate::batch_config::BatchExportConfig;
use crate::error::{MigcheckError, Result};
use crate::executor::QueryExecutor;
use crate::naming::{resolve_table_name, ArtifactNameParts, ArtifactNamer};
use crate::progress::{BatchProgress, CancellationFlag, EntryStatus, BATCH_COMPLETE};
use crate::render::{QueryLogEntry, RecordSet, SheetPayload, SpreadsheetRenderer};
use crate::schema_diff::SOURCE_CONNECTION;
use crate::sink::ArtifactSink;
use crate::tabular::TabularResult;
use indexmap::IndexMap;
use std::sync::Arc;

/// Name of the sheet listing the queries behind an export
pub const QUERY_LOG_SHEET: &str = "Comments";

pub struct BatchExportPipeline {
    executor: Arc<dyn QueryExecutor>,
    namer: ArtifactNamer,
}

impl BatchExportPipeline {
    pub fn new(executor: Arc<dyn QueryExecutor>, namer: ArtifactNamer) -> Self {
        Self { executor, namer }
    }

    /// Run both queries of an entry, waiting for both to finish
    pub async fn fetch(&self, config: &BatchExportConfig) -> Result<(TabularResult, TabularResult)> {
        let (source, target) = tokio::join!(
            self.executor.execute(&config.data_source.sql, SOURCE_CONNECTION),
            self.executor
                .execute(&config.data_target.sql, config.destination.connection_key()),
        );
        Ok((source?, target?))
    }

    /// Workbook for one entry: the source sheet, the target sheet and the query log
    pub async fn build_workbook(&self, config: &BatchExportConfig) -> Result<Vec<u8>> {
        let source_sheet = &config.data_source.sheet_name;
        let target_sheet = &config.data_target.sheet_name;
        for name in [source_sheet, target_sheet] {
            if name.eq_ignore_ascii_case(QUERY_LOG_SHEET) {
                return Err(MigcheckError::invalid_input(format!(
                    "Sheet name '{name}' is reserved for the query log"
                )));
            }
        }
        if source_sheet.to_lowercase() == target_sheet.to_lowercase() {
            return Err(MigcheckError::invalid_input(format!(
                "Source and target sheets are both named '{source_sheet}'"
            )));
        }

        let (source, target) = self.fetch(config).await?;

        let query_log = vec![
            QueryLogEntry {
                sheet_name: source_sheet.clone(),
                sql_query: config.data_source.sql.clone(),
                comments: config.data_source.description.clone(),
            },
            QueryLogEntry {
                sheet_name: target_sheet.clone(),
                sql_query: config.data_target.sql.clone(),
                comments: config.data_target.description.clone(),
            },
        ];

        let mut sheets = IndexMap::new();
        sheets.insert(source_sheet.clone(), SheetPayload::Table(source));
        sheets.insert(target_sheet.clone(), SheetPayload::Table(target));
        sheets.insert(
            QUERY_LOG_SHEET.to_string(),
            SheetPayload::Records(RecordSet::QueryLog(query_log)),
        );
        SpreadsheetRenderer::render_workbook(&sheets)
    }

    /// File name of the artifact for the entry at `index`
    pub fn artifact_name(&self, config: &BatchExportConfig, index: usize) -> String {
        let table = resolve_table_name(config.data_source.table_name.as_deref(), &config.data_source.sql);
        let default_prefix = (index + 1).to_string();
        let prefix = if config.prefix.is_empty() {
            default_prefix.as_str()
        } else {
            config.prefix.as_str()
        };
        self.namer.generate_name(ArtifactNameParts {
            prefix,
            key: &config.key,
            table: &table,
        })
    }

    async fn export_entry(
        &self,
        config: &BatchExportConfig,
        index: usize,
        sink: &mut dyn ArtifactSink,
    ) -> Result<String> {
        let name = self.artifact_name(config, index);
        let bytes = self.build_workbook(config).await?;
        sink.write_artifact(&name, &bytes).await?;
        Ok(name)
    }

    /// Export every entry in order. Returns whether all entries succeeded.
    ///
    /// A sink that fails to finalize makes the batch partial; the completion
    /// event is still reported.
    pub async fn run(
        &self,
        configs: &[BatchExportConfig],
        sink: &mut dyn ArtifactSink,
        progress: &dyn BatchProgress,
        cancel: &CancellationFlag,
    ) -> Result<bool> {
        let total = configs.len();
        let mut all_succeeded = true;
        log::info!("Starting batch export of {} entries to {}", total, sink.location());

        for (index, config) in configs.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Batch export cancelled before entry {} of {}", index + 1, total);
                return Err(MigcheckError::Cancelled);
            }

            progress.on_progress(index, total, &config.key);
            log::debug!("Exporting entry {} ({}/{})", config.key, index + 1, total);

            let status = match self.export_entry(config, index, sink).await {
                Ok(artifact) => EntryStatus::Succeeded { artifact },
                Err(e) => {
                    all_succeeded = false;
                    log::warn!("Failed to export '{}': {}", config.key, e);
                    EntryStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            progress.on_entry_finished(index, &config.key, &status);
        }

        if let Err(e) = sink.finish().await {
            all_succeeded = false;
            log::error!("Failed to finalize {}: {}", sink.location(), e);
        }
        progress.on_progress(total, total, BATCH_COMPLETE);

        if all_succeeded {
            log::info!("Batch export finished: all {total} entries succeeded");
        } else {
            log::info!("Batch export finished with failures");
        }
        Ok(all_succeeded)
    }
}
