//! Configuration file handling.
//!
//! The config file lives at `~/.config/authq/config.toml`. `AUTHQ_CONFIG`
//! points at a different file; `XDG_CONFIG_HOME` moves the directory.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use mquery::collation::Collation;
use mquery::page::TotalPagePolicy;
use serde::{Deserialize, Serialize};
use tenant_api::client::TenantClient;
use thiserror::Error;

use crate::dataset::{DatasetStore, DatasetStoreError};
use crate::services::{QuerySettings, DEFAULT_PAGE_SIZE};

/// Current config file version. Increment when making breaking changes to schema.
const CONFIG_VERSION: u32 = 1;

/// Environment variable overriding the config file path.
pub const CONFIG_ENV: &str = "AUTHQ_CONFIG";

/// Log levels accepted in `[log] level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Keys accepted by [`Config::set`].
pub const CONFIG_KEYS: [&str; 9] = [
    "query.max_depth",
    "query.collation",
    "query.total_page_policy",
    "query.default_page_size",
    "tenant_service.base_url",
    "tenant_service.timeout_secs",
    "tenant_service.max_retries",
    "log.level",
    "dataset.path",
];

/// Errors raised while loading or changing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration file structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Config schema version for migrations.
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub tenant_service: TenantServiceConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            query: QueryConfig::default(),
            tenant_service: TenantServiceConfig::default(),
            log: LogConfig::default(),
            dataset: DatasetConfig::default(),
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum nesting depth of query expressions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// String ordering for sorted reads: `binary`, `simple` or `vi`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<Collation>,

    /// `exact` or `at_least_one`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_page_policy: Option<TotalPagePolicy>,

    /// Page size used when `--size` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_page_size: Option<i64>,
}

/// `[tenant_service]` section. Without a base URL, tenants are read from the
/// dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

/// `[log]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// `[dataset]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Returns the list settings, filling unset values with defaults.
    pub fn query_settings(&self) -> QuerySettings {
        let defaults = QuerySettings::default();
        QuerySettings {
            max_depth: self.query.max_depth.unwrap_or(defaults.max_depth),
            collation: self.query.collation.unwrap_or(defaults.collation),
            policy: self.query.total_page_policy.unwrap_or(defaults.policy),
        }
    }

    /// Returns the page size used when none is given.
    pub fn default_page_size(&self) -> i64 {
        self.query.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Builds a tenant service client when a base URL is configured.
    pub fn tenant_client(&self) -> Option<tenant_api::error::Result<TenantClient>> {
        let service = &self.tenant_service;
        let base_url = service.base_url.as_deref()?;

        let mut builder = TenantClient::builder(base_url);
        if let Some(secs) = service.timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = service.max_retries {
            builder = builder.max_retries(retries);
        }
        Some(builder.build())
    }

    /// Returns the dataset store at the configured or default path.
    pub fn dataset_store(&self) -> std::result::Result<DatasetStore, DatasetStoreError> {
        match &self.dataset.path {
            Some(path) => Ok(DatasetStore::with_path(path)),
            None => DatasetStore::new(),
        }
    }

    /// Sets a dotted key such as `query.collation`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "query.max_depth" => {
                let depth: usize = parse_number(key, value)?;
                if depth == 0 {
                    return Err(ConfigError::Invalid(
                        "query.max_depth must be at least 1".to_string(),
                    ));
                }
                self.query.max_depth = Some(depth);
            }
            "query.collation" => {
                let collation = value
                    .parse::<Collation>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
                self.query.collation = Some(collation);
            }
            "query.total_page_policy" => {
                let policy = match value.to_lowercase().as_str() {
                    "exact" => TotalPagePolicy::Exact,
                    "at_least_one" => TotalPagePolicy::AtLeastOne,
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "Invalid total_page_policy value '{value}'. Valid values: exact, at_least_one"
                        )))
                    }
                };
                self.query.total_page_policy = Some(policy);
            }
            "query.default_page_size" => {
                let size: i64 = parse_number(key, value)?;
                if size < -1 {
                    return Err(ConfigError::Invalid(
                        "query.default_page_size must be -1 or a non-negative number".to_string(),
                    ));
                }
                self.query.default_page_size = Some(size);
            }
            "tenant_service.base_url" => {
                self.tenant_service.base_url = non_empty(value);
            }
            "tenant_service.timeout_secs" => {
                self.tenant_service.timeout_secs = Some(parse_number(key, value)?);
            }
            "tenant_service.max_retries" => {
                self.tenant_service.max_retries = Some(parse_number(key, value)?);
            }
            "log.level" => {
                let level = value.to_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "Invalid log level '{value}'. Valid values: {}",
                        LOG_LEVELS.join(", ")
                    )));
                }
                self.log.level = Some(level);
            }
            "dataset.path" => {
                self.dataset.path = non_empty(value).map(PathBuf::from);
            }
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config key '{key}'. Valid keys: {}",
                    CONFIG_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("Invalid number '{value}' for {key}")))
}

/// Gets the config file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config).join("authq").join("config.toml"));
    }

    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".config").join("authq").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Loads the configuration, or the defaults if no file exists.
pub fn load_config() -> Result<Config> {
    let path = get_config_path()?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path: path.clone(),
        source: e,
    })?;
    let config: Config =
        toml::from_str(&content).map_err(|e| ConfigError::Parse { path, source: e })?;

    migrate_config(config)
}

/// Migrates config to the current version.
fn migrate_config(mut config: Config) -> Result<Config> {
    if config.version > CONFIG_VERSION {
        return Err(ConfigError::Invalid(format!(
            "config version {} is newer than supported version {CONFIG_VERSION}",
            config.version
        )));
    }
    config.version = CONFIG_VERSION;
    Ok(config)
}

/// Saves the configuration, creating the directory if needed.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(&path, content).map_err(|e| ConfigError::Write {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}
