use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "migcheck.toml";
pub const DEFAULT_FILE_NAME_PATTERN: &str = "{prefix}) {key}-{table}(Source).xlsx";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logical database keys (`source`, `target`, `framework`) to connection settings
    #[serde(default)]
    pub connections: HashMap<String, DatabaseConfig>,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JSON file holding the batch export configurations
    pub configs_file: PathBuf,
    pub output_dir: PathBuf,
    pub file_name_pattern: String,
    /// Groups per page in the interactive reconciliation view
    pub page_size: usize,
}

/// SQL templates used to read key and index metadata. `{table}` is replaced
/// by the table name.
///
/// `index_details_sql` must return, in order: index name, column name, index
/// type (`CLUSTERED` / `NONCLUSTERED`), primary-key flag and unique flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub tables_sql: String,
    pub primary_keys_sql: String,
    pub index_details_sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Mysql,
    Postgresql,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,

    /// Direct connection string (alternative to individual fields)
    pub connection_string: Option<String>,

    /// Individual connection fields
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,

    /// Environment variable containing the password
    pub password_env: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            configs_file: PathBuf::from("batch_export_configs.json"),
            output_dir: PathBuf::from("exports"),
            file_name_pattern: DEFAULT_FILE_NAME_PATTERN.to_string(),
            page_size: crate::report::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tables_sql: "SELECT table_name FROM information_schema.tables \
                WHERE table_type = 'BASE TABLE' AND table_catalog = current_database() \
                ORDER BY table_name"
                .to_string(),
            primary_keys_sql: "SELECT kcu.column_name \
                FROM information_schema.table_constraints tc \
                JOIN information_schema.key_column_usage kcu \
                  ON tc.constraint_name = kcu.constraint_name AND tc.table_name = kcu.table_name \
                WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = '{table}' \
                ORDER BY kcu.ordinal_position"
                .to_string(),
            index_details_sql: "SELECT tc.constraint_name, kcu.column_name, \
                CASE WHEN tc.constraint_type = 'PRIMARY KEY' THEN 'CLUSTERED' ELSE 'NONCLUSTERED' END, \
                tc.constraint_type = 'PRIMARY KEY', true \
                FROM information_schema.table_constraints tc \
                JOIN information_schema.key_column_usage kcu \
                  ON tc.constraint_name = kcu.constraint_name AND tc.table_name = kcu.table_name \
                WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') AND tc.table_name = '{table}' \
                ORDER BY tc.constraint_name, kcu.ordinal_position"
                .to_string(),
        }
    }
}

impl MetadataConfig {
    pub fn primary_keys_query(&self, table: &str) -> String {
        fill_table(&self.primary_keys_sql, table)
    }

    pub fn index_details_query(&self, table: &str) -> String {
        fill_table(&self.index_details_sql, table)
    }
}

fn fill_table(template: &str, table: &str) -> String {
    template.replace("{table}", &table.replace('\'', "''"))
}

fn global_config_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".migcheck")
    } else {
        PathBuf::from(".migcheck")
    }
}

/// Load a configuration file, failing if it cannot be read or parsed
pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config '{}': {}", path.display(), e))?;
    let mut config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config '{}': {}", path.display(), e))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn get_config() -> Result<Config> {
    // Priority order (highest to lowest):
    // 1. Explicit config file via MIGCHECK_CONFIG env var
    // 2. Local config file (migcheck.toml)
    // 3. Saved global config file (~/.migcheck/global.toml)
    // 4. Default configuration

    if let Ok(config_path) = env::var("MIGCHECK_CONFIG") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return load_config_from(&path);
        }
        log::warn!("MIGCHECK_CONFIG points to missing file {}", path.display());
    }

    let local_config_path = env::current_dir()?.join(CONFIG_FILE_NAME);
    if local_config_path.exists() {
        return load_config_from(&local_config_path);
    }

    let global_config_path = global_config_dir().join("global.toml");
    if global_config_path.exists() {
        return load_config_from(&global_config_path);
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(dir) = env::var("MIGCHECK_OUTPUT_DIR") {
        config.export.output_dir = PathBuf::from(dir);
    }
    if let Ok(file) = env::var("MIGCHECK_CONFIGS_FILE") {
        config.export.configs_file = PathBuf::from(file);
    }
}

impl Config {
    /// Look up a connection by key, ignoring case
    pub fn connection(&self, key: &str) -> Option<&DatabaseConfig> {
        self.connections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, config)| config)
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Connection setting '{what}' is required"))
}

impl DatabaseConfig {
    fn password(&self) -> Result<String> {
        let variable = required(&self.password_env, "password_env")?;
        env::var(variable)
            .map_err(|_| anyhow::anyhow!("Password environment variable '{variable}' is not set"))
    }

    /// Connection string for DuckDB's attach: the explicit string with
    /// `{password}` filled in, or one assembled from the individual fields
    pub fn build_connection_string(&self) -> Result<String> {
        if let Some(explicit) = &self.connection_string {
            return Ok(match self.password() {
                Ok(password) => explicit.replace("{password}", &password),
                Err(_) => explicit.clone(),
            });
        }

        let database = required(&self.database, "database")?;
        match self.db_type {
            // The database field is the file path
            DatabaseType::Sqlite => Ok(database.to_string()),
            DatabaseType::Mysql => {
                let host = required(&self.host, "host")?;
                let user = required(&self.username, "username")?;
                let port = self.port.unwrap_or(3306);
                let password = self.password()?;
                Ok(format!(
                    "host={host} port={port} database={database} user={user} password={password}"
                ))
            }
            DatabaseType::Postgresql => {
                let host = required(&self.host, "host")?;
                let user = required(&self.username, "username")?;
                let port = self.port.unwrap_or(5432);
                let password = self.password()?;
                Ok(format!("postgresql://{user}:{password}@{host}:{port}/{database}"))
            }
        }
    }

    /// DuckDB `ATTACH` statement exposing this database under `alias`
    pub fn attach_statement(&self, alias: &str) -> Result<String> {
        let connection_string = self.build_connection_string()?.replace('\'', "''");
        let db_type = match self.db_type {
            DatabaseType::Mysql => "mysql",
            DatabaseType::Postgresql => "postgres",
            DatabaseType::Sqlite => "sqlite",
        };
        Ok(format!(
            "ATTACH '{connection_string}' AS {alias} (TYPE {db_type}, READ_ONLY);"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mysql_config() -> DatabaseConfig {
        DatabaseConfig {
            db_type: DatabaseType::Mysql,
            connection_string: None,
            host: Some("localhost".to_string()),
            port: None,
            database: Some("legacy".to_string()),
            username: Some("auditor".to_string()),
            password_env: Some("MIGCHECK_TEST_MYSQL_PASSWORD".to_string()),
        }
    }

    #[test]
    fn test_database_config_connection_string() {
        env::set_var("MIGCHECK_TEST_MYSQL_PASSWORD", "secret");
        let connection_string = mysql_config().build_connection_string().unwrap();
        assert_eq!(
            connection_string,
            "host=localhost port=3306 database=legacy user=auditor password=secret"
        );
    }

    #[test]
    fn test_connection_string_password_substitution() {
        env::set_var("MIGCHECK_TEST_PG_PASSWORD", "pw");
        let config = DatabaseConfig {
            db_type: DatabaseType::Postgresql,
            connection_string: Some("postgresql://app:{password}@db/target".to_string()),
            host: None,
            port: None,
            database: None,
            username: None,
            password_env: Some("MIGCHECK_TEST_PG_PASSWORD".to_string()),
        };
        assert_eq!(
            config.build_connection_string().unwrap(),
            "postgresql://app:pw@db/target"
        );
        assert_eq!(
            config.attach_statement("target").unwrap(),
            "ATTACH 'postgresql://app:pw@db/target' AS target (TYPE postgres, READ_ONLY);"
        );
    }

    #[test]
    fn test_missing_password_env_is_an_error() {
        let mut config = mysql_config();
        config.password_env = Some("MIGCHECK_TEST_UNSET_PASSWORD".to_string());
        assert!(config.build_connection_string().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
[connections.source]
type = "sqlite"
database = "legacy.db"

[connections.Target]
type = "postgresql"
connection_string = "postgresql://localhost/new"

[export]
configs_file = "jobs.json"
output_dir = "out"
file_name_pattern = "{key}.xlsx"
page_size = 25
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.connections.len(), 2);
        assert!(config.connection("target").is_some());
        assert_eq!(config.export.page_size, 25);
        assert_eq!(config.export.configs_file, PathBuf::from("jobs.json"));
        assert!(config.metadata.tables_sql.contains("information_schema"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.export.file_name_pattern, DEFAULT_FILE_NAME_PATTERN);
        assert_eq!(config.export.page_size, 10);
        assert!(config.metadata.primary_keys_query("O'Brien").contains("'O''Brien'"));
    }
}
