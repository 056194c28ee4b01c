//! Command-line interface for migcheck

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migcheck")]
#[command(about = "Verify a database migration by reconciling source and target query results")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this configuration file instead of the usual lookup
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the configured source/target query pairs as workbooks
    Export {
        /// Only export these configuration keys (defaults to all, in prefix order)
        #[arg(long, num_args = 1..)]
        keys: Option<Vec<String>>,

        /// Write one workbook per entry into this directory
        #[arg(long, conflicts_with = "zip")]
        dir: Option<PathBuf>,

        /// Collect all workbooks into this zip archive
        #[arg(long)]
        zip: Option<PathBuf>,
    },

    /// Reconcile the results of one configuration row by row
    Validate {
        /// Configuration key
        key: String,

        /// Row to compare: first, middle, last or a 0-based index
        #[arg(long, default_value = "first", conflicts_with = "all")]
        row: String,

        /// Compare every overlapping row and list only mismatches
        #[arg(long)]
        all: bool,

        /// Target columns to leave out of the comparison
        #[arg(long, num_args = 1..)]
        exclude: Vec<String>,

        /// Page of groups to show (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Write the full report to this workbook
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compare primary keys and indexes of mapped tables
    Schema {
        /// JSON file with the table mappings
        #[arg(long)]
        mappings: PathBuf,

        /// Output workbook
        #[arg(long, default_value = "schema-comparison.xlsx")]
        output: PathBuf,
    },

    /// Render stored field comparisons as a coverage workbook
    Coverage {
        /// JSON file with the stored comparison reports
        reports: PathBuf,

        /// Output workbook
        #[arg(long, default_value = "field-coverage.xlsx")]
        output: PathBuf,
    },

    /// List target tables that are missing from a list of source tables
    MissingTables {
        /// JSON file holding an array of table names
        tables: PathBuf,
    },

    /// Maintain the stored batch export configurations
    Configs {
        #[command(subcommand)]
        command: ConfigsCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigsCommands {
    /// List configurations in prefix order
    List {
        /// Only keys containing this text (case-insensitive)
        #[arg(long)]
        keyword: Option<String>,

        /// Only configurations lacking a description on either side
        #[arg(long)]
        missing_description: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge configurations from a JSON file
    Import {
        file: PathBuf,
    },

    /// Write all configurations to a JSON file
    Export {
        file: PathBuf,
    },

    /// Delete a configuration by key
    Delete {
        key: String,
    },
}
