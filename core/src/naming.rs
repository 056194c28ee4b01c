use crate::config::DEFAULT_FILE_NAME_PATTERN;
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Table name used in artifact names when none can be determined
pub const UNKNOWN_TABLE: &str = "UnknownTable";

/// Identifying parts of one exported artifact
#[derive(Debug, Clone, Copy)]
pub struct ArtifactNameParts<'a> {
    pub prefix: &'a str,
    pub key: &'a str,
    pub table: &'a str,
}

pub struct ArtifactNamer {
    pattern: String,
}

impl Default for ArtifactNamer {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_NAME_PATTERN.to_string())
    }
}

impl ArtifactNamer {
    pub fn new(pattern: String) -> Self {
        Self { pattern }
    }

    pub fn generate_name(&self, parts: ArtifactNameParts<'_>) -> String {
        let variables = self.build_variables(parts);
        let mut result = self.pattern.clone();

        // Replace variables in the pattern
        for (key, value) in variables {
            result = result.replace(&format!("{{{key}}}"), &value);
        }

        sanitize_file_name(&result)
    }

    fn build_variables(&self, parts: ArtifactNameParts<'_>) -> HashMap<&'static str, String> {
        let mut variables = HashMap::new();

        variables.insert("prefix", parts.prefix.to_string());
        variables.insert("key", parts.key.to_string());
        variables.insert("table", parts.table.to_string());

        let now = Local::now();
        variables.insert("timestamp", now.format("%Y%m%d_%H%M%S").to_string());
        variables.insert("date", now.format("%Y%m%d").to_string());

        variables.insert("user", whoami::username());

        variables
    }
}

/// Replace characters that are not allowed in file names with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn from_keyword() -> &'static Regex {
    static FROM: OnceLock<Regex> = OnceLock::new();
    FROM.get_or_init(|| Regex::new(r"(?i)from").expect("valid regex"))
}

fn order_by_keyword() -> &'static Regex {
    static ORDER_BY: OnceLock<Regex> = OnceLock::new();
    ORDER_BY.get_or_init(|| Regex::new(r"(?i)order by").expect("valid regex"))
}

/// Best-effort table name from a query: the first word after the first
/// `FROM`, ignoring any `ORDER BY` tail.
///
/// Only used for naming files. Subqueries, comments and quoted names are not
/// understood; `None` means nothing usable was found.
pub fn extract_table_name(sql: &str) -> Option<String> {
    let from = from_keyword().find(sql)?;
    let mut rest = sql[from.end()..].trim();
    if let Some(order_by) = order_by_keyword().find(rest) {
        rest = rest[..order_by.start()].trim();
    }
    rest.split_whitespace().next().map(str::to_string)
}

/// The explicit table name if set, else the name parsed from the query,
/// else [`UNKNOWN_TABLE`]
pub fn resolve_table_name(table_name: Option<&str>, sql: &str) -> String {
    table_name
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| extract_table_name(sql))
        .unwrap_or_else(|| UNKNOWN_TABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(prefix: &'a str, key: &'a str, table: &'a str) -> ArtifactNameParts<'a> {
        ArtifactNameParts { prefix, key, table }
    }

    #[test]
    fn test_default_pattern() {
        let namer = ArtifactNamer::default();
        let name = namer.generate_name(parts("3", "orders", "dbo.Orders"));
        assert_eq!(name, "3) orders-dbo.Orders(Source).xlsx");
    }

    #[test]
    fn test_pattern_with_date_and_invalid_characters() {
        let namer = ArtifactNamer::new("{key}_{date}/{table}.xlsx".to_string());
        let name = namer.generate_name(parts("1", "a:b", "T"));
        assert!(name.starts_with("a_b_"));
        assert!(name.ends_with("_T.xlsx"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_extract_table_name() {
        assert_eq!(extract_table_name("SELECT * FROM Users").as_deref(), Some("Users"));
        assert_eq!(
            extract_table_name("select id from dbo.Orders order by id").as_deref(),
            Some("dbo.Orders")
        );
        assert_eq!(
            extract_table_name("SELECT * FROM   Users u WHERE u.Id > 1").as_deref(),
            Some("Users")
        );
        assert_eq!(
            extract_table_name("SELECT *\nFROM Users\nWHERE Id = 1").as_deref(),
            Some("Users")
        );
        assert_eq!(extract_table_name("SELECT * FROM\tOrders\t o").as_deref(), Some("Orders"));
        assert_eq!(extract_table_name("SELECT 1"), None);
        assert_eq!(extract_table_name("SELECT * FROM ORDER BY x"), None);
    }

    #[test]
    fn test_resolve_table_name_fallbacks() {
        assert_eq!(resolve_table_name(Some("Explicit"), "SELECT * FROM Other"), "Explicit");
        assert_eq!(resolve_table_name(Some("  "), "SELECT * FROM Other"), "Other");
        assert_eq!(resolve_table_name(None, "SELECT 1"), UNKNOWN_TABLE);
    }
}
