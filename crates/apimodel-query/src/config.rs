use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::columns::{StaticColumnCatalog, TableIdentity};
use crate::error::ConfigurationError;
use crate::registry::SchemaRegistry;
use crate::schema::ResourceSchema;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
    /// Known columns per table (`table` or `database.table`), used for
    /// deny-list projections when no live catalog is attached.
    #[serde(default)]
    pub columns: BTreeMap<String, Vec<String>>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.query.column_cache_ttl_secs == 0 {
            return Err(ConfigurationError::invalid(
                "query.column_cache_ttl_secs must be > 0",
            ));
        }
        if self.query.default_max_limit == 0 {
            return Err(ConfigurationError::invalid(
                "query.default_max_limit must be > 0",
            ));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigurationError::invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        for resource in &self.resources {
            resource.validate()?;
        }
        Ok(())
    }

    /// Registry of every configured resource.
    ///
    /// Resources without their own `max_limit` get `query.default_max_limit`.
    pub fn registry(&self) -> Result<SchemaRegistry, ConfigurationError> {
        SchemaRegistry::from_schemas(self.resources.iter().cloned().map(|mut schema| {
            if schema.max_limit.is_none() {
                schema.max_limit = Some(self.query.default_max_limit);
            }
            schema
        }))
    }

    pub fn column_catalog(&self) -> StaticColumnCatalog {
        let mut catalog = StaticColumnCatalog::new();
        for (name, columns) in &self.columns {
            let table = match name.split_once('.') {
                Some((database, table)) => TableIdentity::new(Some(database.to_string()), table),
                None => TableIdentity::table(name.as_str()),
            };
            catalog.insert(table, columns.iter().cloned());
        }
        catalog
    }

    pub fn column_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.query.column_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_column_cache_ttl_secs")]
    pub column_cache_ttl_secs: u64,
    #[serde(default = "default_max_limit")]
    pub default_max_limit: u64,
    /// Remove appended attributes from `get` results.
    #[serde(default = "default_strip_appends")]
    pub strip_appends: bool,
}

fn default_column_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_max_limit() -> u64 {
    1000
}
fn default_strip_appends() -> bool {
    true
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            column_cache_ttl_secs: default_column_cache_ttl_secs(),
            default_max_limit: default_max_limit(),
            strip_appends: default_strip_appends(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use crate::error::ConfigurationError;
    use ::config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "apimodel.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigurationError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if let Some(explicit) = path {
            return Err(ConfigurationError::invalid(format!(
                "config file not found: {explicit}"
            )));
        }
        // Environment variable overrides, e.g., APIMODEL__QUERY__DEFAULT_MAX_LIMIT=50
        builder = builder.add_source(
            Environment::with_prefix("APIMODEL")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigurationError::invalid(format!("config build error: {e}")))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigurationError::invalid(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
