//! Batch export configurations and their JSON store

use crate::error::{MigcheckError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Which database the target side of an entry reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DestinationRepr")]
pub enum Destination {
    #[default]
    Target,
    Framework,
}

/// Destinations are accepted by name (any case) or by position (0, 1)
#[derive(Deserialize)]
#[serde(untagged)]
enum DestinationRepr {
    Index(u8),
    Name(String),
}

impl TryFrom<DestinationRepr> for Destination {
    type Error = String;

    fn try_from(repr: DestinationRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            DestinationRepr::Index(0) => Ok(Destination::Target),
            DestinationRepr::Index(1) => Ok(Destination::Framework),
            DestinationRepr::Name(name) if name.eq_ignore_ascii_case("target") => Ok(Destination::Target),
            DestinationRepr::Name(name) if name.eq_ignore_ascii_case("framework") => {
                Ok(Destination::Framework)
            }
            DestinationRepr::Index(i) => Err(format!("unknown destination index {i}")),
            DestinationRepr::Name(name) => Err(format!("unknown destination '{name}'")),
        }
    }
}

impl Destination {
    /// Connection key the target-side query runs on
    pub fn connection_key(&self) -> &'static str {
        match self {
            Destination::Target => "target",
            Destination::Framework => "framework",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(alias = "SheetName")]
    pub sheet_name: String,
    #[serde(alias = "TableName", default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(alias = "Sql")]
    pub sql: String,
    #[serde(alias = "Description", default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExportConfig {
    #[serde(alias = "Key")]
    pub key: String,
    #[serde(alias = "Destination", default)]
    pub destination: Destination,
    #[serde(alias = "DataSource")]
    pub data_source: QueryConfig,
    #[serde(alias = "DataTarget")]
    pub data_target: QueryConfig,
    #[serde(alias = "Prefix", default)]
    pub prefix: String,
}

impl BatchExportConfig {
    /// True when either side has a blank description
    pub fn is_missing_description(&self) -> bool {
        self.data_source.description.trim().is_empty() || self.data_target.description.trim().is_empty()
    }

    /// Keys are unique ignoring case
    pub fn has_key(&self, key: &str) -> bool {
        self.key.to_lowercase() == key.to_lowercase()
    }

    pub fn key_matches(&self, keyword: &str) -> bool {
        keyword.trim().is_empty() || self.key.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// Outcome of [`ConfigStore::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The key exists and overwriting was not allowed; nothing was written
    AlreadyExists,
}

/// Counts reported by [`ConfigStore::import_json`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub updated: usize,
    pub added: usize,
}

/// Ordered list of configurations persisted as one JSON file
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all configurations. A missing file is an empty list; blank
    /// prefixes become the 1-based position.
    pub fn load(&self) -> Result<Vec<BatchExportConfig>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut configs: Vec<BatchExportConfig> = serde_json::from_str(&content)?;
        for (index, config) in configs.iter_mut().enumerate() {
            if config.prefix.is_empty() {
                config.prefix = (index + 1).to_string();
            }
        }
        Ok(configs)
    }

    pub fn save_all(&self, configs: &[BatchExportConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, to_json(configs)?)?;
        log::debug!("Saved {} configurations to {}", configs.len(), self.path.display());
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.load()?.iter().any(|c| c.has_key(key)))
    }

    /// Insert a configuration, or replace the one with the same key (ignoring
    /// case) in place when `overwrite` is set
    pub fn upsert(&self, config: BatchExportConfig, overwrite: bool) -> Result<SaveOutcome> {
        if config.key.trim().is_empty() {
            return Err(MigcheckError::invalid_input("Configuration key must not be empty"));
        }

        let mut configs = self.load()?;
        match configs.iter().position(|c| c.has_key(&config.key)) {
            Some(_) if !overwrite => return Ok(SaveOutcome::AlreadyExists),
            Some(index) => configs[index] = config,
            None => configs.push(config),
        }
        self.save_all(&configs)?;
        Ok(SaveOutcome::Saved)
    }

    /// Remove a configuration by key. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut configs = self.load()?;
        let before = configs.len();
        configs.retain(|c| !c.has_key(key));
        if configs.len() == before {
            return Ok(false);
        }
        self.save_all(&configs)?;
        Ok(true)
    }

    /// Merge configurations from JSON text: existing keys are replaced, new
    /// keys appended
    pub fn import_json(&self, json: &str) -> Result<ImportSummary> {
        if json.trim().is_empty() {
            return Err(MigcheckError::invalid_input("Nothing to import"));
        }
        let imported: Vec<BatchExportConfig> = serde_json::from_str(json)?;
        let mut configs = self.load()?;
        let mut summary = ImportSummary::default();

        for config in imported {
            match configs.iter_mut().find(|c| c.has_key(&config.key)) {
                Some(existing) => {
                    *existing = config;
                    summary.updated += 1;
                }
                None => {
                    configs.push(config);
                    summary.added += 1;
                }
            }
        }

        self.save_all(&configs)?;
        log::info!(
            "Imported configurations: {} updated, {} added",
            summary.updated,
            summary.added
        );
        Ok(summary)
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let configs = self.load()?;
        std::fs::write(path, to_json(&configs)?)?;
        Ok(())
    }
}

fn to_json(configs: &[BatchExportConfig]) -> Result<String> {
    Ok(serde_json::to_string_pretty(configs)?)
}

/// "Logical" string ordering: runs of digits compare by value, everything
/// else compares without case
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits = take_digits(&mut left);
                let r_digits = take_digits(&mut right);
                let l_trimmed = l_digits.trim_start_matches('0');
                let r_trimmed = r_digits.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

/// Sort configurations by prefix in natural order (stable)
pub fn sort_by_prefix(configs: &mut [BatchExportConfig]) {
    configs.sort_by(|a, b| natural_cmp(&a.prefix, &b.prefix));
}

/// Keep configurations whose key contains `keyword` (ignoring case) and, when
/// `missing_description_only` is set, that lack a description on either side
pub fn filter_configs<'a>(
    configs: &'a [BatchExportConfig],
    keyword: &str,
    missing_description_only: bool,
) -> Vec<&'a BatchExportConfig> {
    configs
        .iter()
        .filter(|c| c.key_matches(keyword))
        .filter(|c| !missing_description_only || c.is_missing_description())
        .collect()
}
