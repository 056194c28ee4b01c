//! Command implementations for migcheck CLI

use crate::cli::{Commands, ConfigsCommands};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::{create_spinner, BatchProgressBar};
use migcheck_core::batch_config::{filter_configs, sort_by_prefix, BatchExportConfig, ConfigStore};
use migcheck_core::comparator::{ExcludedColumns, RowComparator, RowSelector};
use migcheck_core::config::{self, Config};
use migcheck_core::coverage::{missing_tables, render_coverage_workbook, ComparisonReport};
use migcheck_core::error::{MigcheckError, Result};
use migcheck_core::executor::{DuckDbQueryExecutor, QueryExecutor};
use migcheck_core::metadata::{ExecutorMetadataProvider, MetadataProvider};
use migcheck_core::naming::ArtifactNamer;
use migcheck_core::pipeline::BatchExportPipeline;
use migcheck_core::progress::{BatchOutcome, CancellationFlag};
use migcheck_core::render::SpreadsheetRenderer;
use migcheck_core::report::ReconciliationReport;
use migcheck_core::schema_diff::{SchemaDiffAnalyzer, TableMapping, TARGET_CONNECTION};
use migcheck_core::sink::{ArchiveSink, ArtifactSink, DirectorySink};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    match command {
        Commands::Export { keys, dir, zip } => export_command(&config, keys, dir, zip),
        Commands::Validate {
            key,
            row,
            all,
            exclude,
            page,
            report,
        } => validate_command(&config, &key, &row, all, &exclude, page, report.as_deref()),
        Commands::Schema { mappings, output } => schema_command(&config, &mappings, &output),
        Commands::Coverage { reports, output } => coverage_command(&reports, &output),
        Commands::MissingTables { tables } => missing_tables_command(&config, &tables),
        Commands::Configs { command } => configs_command(&config, command),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let loaded = match config_path {
        Some(path) => config::load_config_from(path),
        None => config::get_config(),
    };
    loaded.map_err(|e| MigcheckError::config(format!("{e:#}")))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MigcheckError::invalid_input(format!("Failed to read '{}': {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_workbook(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn executor_for(config: &Config) -> Arc<dyn QueryExecutor> {
    Arc::new(DuckDbQueryExecutor::from_config(config))
}

/// Stored configurations in prefix order, narrowed to `keys` when given
fn select_configs(config: &Config, keys: Option<&[String]>) -> Result<Vec<BatchExportConfig>> {
    let store = ConfigStore::new(&config.export.configs_file);
    let mut configs = store.load()?;
    sort_by_prefix(&mut configs);

    let Some(keys) = keys else {
        return Ok(configs);
    };
    let mut selected = Vec::with_capacity(keys.len());
    for key in keys {
        let found = configs
            .iter()
            .find(|c| c.has_key(key))
            .ok_or_else(|| MigcheckError::invalid_input(format!("No configuration with key '{key}'")))?;
        selected.push(found.clone());
    }
    Ok(selected)
}

/// Batch export of stored configurations
fn export_command(
    config: &Config,
    keys: Option<Vec<String>>,
    dir: Option<PathBuf>,
    zip: Option<PathBuf>,
) -> Result<()> {
    let configs = select_configs(config, keys.as_deref())?;
    if configs.is_empty() {
        println!("No configurations to export.");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pipeline = BatchExportPipeline::new(
            executor_for(config),
            ArtifactNamer::new(config.export.file_name_pattern.clone()),
        );

        let mut sink: Box<dyn ArtifactSink> = match zip {
            Some(path) => Box::new(ArchiveSink::new(path)),
            None => Box::new(DirectorySink::new(
                dir.unwrap_or_else(|| config.export.output_dir.clone()),
            )),
        };
        let location = sink.location();

        let cancel = CancellationFlag::new();
        let ctrl_c_flag = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Cancellation requested, stopping after the current entry");
                ctrl_c_flag.cancel();
            }
        });

        let progress = BatchProgressBar::new(configs.len());
        let result = pipeline.run(&configs, &mut *sink, &progress, &cancel).await;
        let outcome = BatchOutcome::from_result(result)?;
        if outcome == BatchOutcome::Cancelled {
            progress.abandon("cancelled");
        }

        PrettyPrinter::print_batch_outcome(outcome, &location);
        Ok::<(), MigcheckError>(())
    })
}

/// Reconcile the two query results of one configuration
#[allow(clippy::too_many_arguments)]
fn validate_command(
    config: &Config,
    key: &str,
    row: &str,
    all: bool,
    exclude: &[String],
    page: usize,
    report_path: Option<&Path>,
) -> Result<()> {
    let selector: RowSelector = row.parse()?;
    let keys = [key.to_string()];
    let entry = select_configs(config, Some(&keys[..]))?
        .into_iter()
        .next()
        .ok_or_else(|| MigcheckError::invalid_input(format!("No configuration with key '{key}'")))?;

    let mut excluded = ExcludedColumns::new();
    for column in exclude {
        excluded.insert(column);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let (source, target) = rt.block_on(async {
        let pipeline = BatchExportPipeline::new(executor_for(config), ArtifactNamer::default());
        let spinner = create_spinner(&format!("Running queries for {}...", entry.key));
        let results = pipeline.fetch(&entry).await;
        spinner.finish_and_clear();
        results
    })?;

    let report = if all {
        ReconciliationReport::from_comparison(RowComparator::compare_all(&source, &target, &excluded))
    } else {
        let index = selector.resolve(source.row_count());
        ReconciliationReport::from_single_row(&source, &target, index, &excluded)?
    };
    let mut report = report.with_page_size(config.export.page_size);
    if page != report.current_page() && !report.go_to_page(page) {
        log::warn!("Page {page} is out of range, showing {}", report.page_info());
    }

    PrettyPrinter::print_report(&report);

    if let Some(path) = report_path {
        if report.can_export() {
            write_workbook(path, &report.export_workbook()?)?;
            println!("📄 Report written to {}", path.display());
        } else {
            println!("Nothing to export.");
        }
    }
    Ok(())
}

/// Compare key and index metadata for a list of table mappings
fn schema_command(config: &Config, mappings_path: &Path, output: &Path) -> Result<()> {
    let mappings: Vec<TableMapping> = read_json(mappings_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    let results = rt.block_on(async {
        let provider = ExecutorMetadataProvider::new(executor_for(config), config.metadata.clone());
        let spinner = create_spinner("Reading key and index metadata...");
        let results = SchemaDiffAnalyzer::analyze(&mappings, &provider).await;
        spinner.finish_and_clear();
        results
    })?;

    PrettyPrinter::print_schema_results(&results);
    write_workbook(output, &SpreadsheetRenderer::render_schema_comparison(&results)?)?;
    println!("📄 Schema comparison written to {}", output.display());
    Ok(())
}

fn coverage_command(reports_path: &Path, output: &Path) -> Result<()> {
    let reports: Vec<ComparisonReport> = read_json(reports_path)?;
    let coverage: Vec<_> = reports.iter().map(ComparisonReport::coverage).collect();

    PrettyPrinter::print_coverage(&coverage);
    if reports.is_empty() {
        return Ok(());
    }
    write_workbook(output, &render_coverage_workbook(&reports)?)?;
    println!("📄 Field coverage written to {}", output.display());
    Ok(())
}

fn missing_tables_command(config: &Config, tables_path: &Path) -> Result<()> {
    let source_tables: Vec<String> = read_json(tables_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    let target_tables = rt.block_on(async {
        let provider = ExecutorMetadataProvider::new(executor_for(config), config.metadata.clone());
        provider.tables(TARGET_CONNECTION).await
    })?;

    PrettyPrinter::print_missing_tables(&missing_tables(&target_tables, &source_tables));
    Ok(())
}

fn configs_command(config: &Config, command: ConfigsCommands) -> Result<()> {
    let store = ConfigStore::new(&config.export.configs_file);

    match command {
        ConfigsCommands::List {
            keyword,
            missing_description,
            json,
        } => {
            let mut configs = store.load()?;
            sort_by_prefix(&mut configs);
            let filtered = filter_configs(&configs, keyword.as_deref().unwrap_or(""), missing_description);
            if json {
                println!("{}", JsonFormatter::format_configs(&filtered)?);
            } else {
                PrettyPrinter::print_config_list(&filtered);
            }
        }
        ConfigsCommands::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let summary = store.import_json(&content)?;
            println!(
                "✅ Imported {} configurations ({} updated, {} added)",
                summary.updated + summary.added,
                summary.updated,
                summary.added
            );
        }
        ConfigsCommands::Export { file } => {
            store.export_json(&file)?;
            println!("✅ Configurations exported to {}", file.display());
        }
        ConfigsCommands::Delete { key } => {
            if store.delete(&key)? {
                println!("🗑️  Deleted configuration '{key}'");
            } else {
                return Err(MigcheckError::invalid_input(format!(
                    "No configuration with key '{key}'"
                )));
            }
        }
    }
    Ok(())
}
