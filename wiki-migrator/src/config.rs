use crate::error::{MigrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source of the enabled extension identifiers that gate which macro
/// converters take part in a migration
pub trait MigrationConfiguration: Send + Sync {
    /// Enabled extension identifiers, in configured order
    fn extension_ids(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub migration: MigrationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Comma-separated extension identifiers, e.g. "macro-tasklist,macro-code"
    pub extension_ids: Option<String>,
    /// Reference under which migrated spaces are created
    #[serde(default = "default_target_root")]
    pub target_root: String,
    #[serde(default = "default_max_parallel_spaces")]
    pub max_parallel_spaces: usize,
    /// Body marker a legacy task list must contain to be rewritten
    #[serde(default = "default_tasklist_marker")]
    pub tasklist_marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_target_root() -> String {
    "Migrated".to_string()
}

fn default_max_parallel_spaces() -> usize {
    4
}

fn default_tasklist_marker() -> String {
    crate::macros::converters::LEGACY_TASKLIST_MARKER.to_string()
}

/// Decode a comma-separated extension list.
///
/// Items are trimmed and empty segments skipped; a value that yields no
/// identifier at all is rejected rather than treated as "nothing enabled".
pub fn parse_extension_ids(raw: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(MigrationError::Config(
            "migration.extension_ids is empty".to_string(),
        ));
    }

    Ok(ids)
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| MigrationError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.migration.max_parallel_spaces == 0 {
            return Err(MigrationError::Config(
                "migration.max_parallel_spaces must be at least 1".to_string(),
            ));
        }
        if self.migration.target_root.trim().is_empty() {
            return Err(MigrationError::Config(
                "migration.target_root must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default() -> Self {
        Self {
            migration: MigrationConfig {
                extension_ids: Some("macro-tasklist,macro-code,macro-panel".to_string()),
                target_root: default_target_root(),
                max_parallel_spaces: default_max_parallel_spaces(),
                tasklist_marker: default_tasklist_marker(),
            },
            storage: StorageConfig {
                database_url: "sqlite://migration.db".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl MigrationConfiguration for Config {
    fn extension_ids(&self) -> Result<Vec<String>> {
        match &self.migration.extension_ids {
            Some(raw) => parse_extension_ids(raw),
            None => Err(MigrationError::Config(
                "migration.extension_ids is not set".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_extension_ids_ordered() {
        let ids = parse_extension_ids("macro-a,macro-b").unwrap();
        assert_eq!(ids, vec!["macro-a".to_string(), "macro-b".to_string()]);
    }

    #[test]
    fn test_parse_extension_ids_trims_and_skips_empty() {
        let ids = parse_extension_ids(" macro-a , ,macro-b,").unwrap();
        assert_eq!(ids, vec!["macro-a", "macro-b"]);
    }

    #[test]
    fn test_parse_extension_ids_empty_is_error() {
        assert!(matches!(
            parse_extension_ids(""),
            Err(MigrationError::Config(_))
        ));
        assert!(matches!(
            parse_extension_ids(" , "),
            Err(MigrationError::Config(_))
        ));
    }

    #[test]
    fn test_missing_extension_ids_is_error() {
        let mut config = Config::default();
        config.migration.extension_ids = None;
        assert!(matches!(
            config.extension_ids(),
            Err(MigrationError::Config(_))
        ));
    }

    #[test]
    fn test_parse_config_with_defaults() {
        let toml = r#"
[migration]
extension_ids = "macro-tasklist"

[storage]
database_url = "sqlite::memory:"

[logging]
level = "debug"
format = "json"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.migration.target_root, "Migrated");
        assert_eq!(config.migration.max_parallel_spaces, 4);
        assert_eq!(config.migration.tasklist_marker, "123_test_123");
        assert_eq!(config.extension_ids().unwrap(), vec!["macro-tasklist"]);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let toml = r#"
[migration]
extension_ids = "macro-code"
max_parallel_spaces = 0

[storage]
database_url = "sqlite::memory:"

[logging]
level = "info"
format = "pretty"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let content = toml::to_string(&Config::default()).unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.extension_ids().unwrap(),
            vec!["macro-tasklist", "macro-code", "macro-panel"]
        );
    }
}
