//! Service configuration.
//!
//! Handles loading, validating, and merging `snap-serve.toml`. User values are
//! layered over stock defaults, so a config file only needs the keys it wants
//! to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! backend = "local"          # "local" writes under `root`; "http" PUTs to `endpoint`
//! root = "storage"           # local: directory objects are written to
//! endpoint = ""              # http: base URL objects are PUT to
//! public_base_url = "http://localhost:8080/storage"
//! prefix = "images/"         # key prefix for every object (must end in "/")
//!
//! [records]
//! path = "records.json"      # JSON file holding image metadata rows
//!
//! [network]
//! fetch_timeout_secs = 30    # per source download
//! upload_timeout_secs = 50   # per object write
//!
//! [processing]
//! max_workers = 8            # omit for auto = CPU cores
//!
//! [logging]
//! filter = "info"            # tracing filter; RUST_LOG wins when set
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only switch to an HTTP object store
//! [storage]
//! backend = "http"
//! endpoint = "https://bucket.example.com"
//! public_base_url = "https://cdn.example.com"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `snap-serve.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Where processed and uploaded objects go.
    pub storage: StorageConfig,
    /// Where image metadata rows go.
    pub records: RecordsConfig,
    /// Per-call network deadlines.
    pub network: NetworkConfig,
    /// Worker pool settings.
    pub processing: ProcessingConfig,
    /// Log filter.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.prefix.is_empty() || !self.storage.prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "storage.prefix must be non-empty and end with '/'".into(),
            ));
        }
        if self.storage.public_base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.public_base_url must not be empty".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Http && self.storage.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.endpoint is required when storage.backend = \"http\"".into(),
            ));
        }
        if self.network.fetch_timeout_secs == 0 || self.network.upload_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "network timeouts must be non-zero".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Http,
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Local backend: directory objects are written under.
    pub root: PathBuf,
    /// HTTP backend: base URL objects are PUT to.
    pub endpoint: String,
    /// Base of the public URLs handed back to callers.
    pub public_base_url: String,
    /// Key prefix for every object, ending in `/`.
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("storage"),
            endpoint: String::new(),
            public_base_url: "http://localhost:8080/storage".to_string(),
            prefix: "images/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordsConfig {
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("records.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub fetch_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            upload_timeout_secs: 50,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of concurrent item workers.
    /// When absent, defaults to the number of CPU cores.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `n`, even above the core count, since workers spend most
///   of their time waiting on the network
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.unwrap_or(cores).max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    // Every field has a TOML representation, so this cannot fail
    toml::Value::try_from(ServiceConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults. User values are merged on top
/// of stock defaults, unknown keys are rejected, and the result is validated.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `snap-serve.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# snap-serve Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Object storage
# ---------------------------------------------------------------------------
[storage]
# "local" writes objects under `root`; "http" PUTs them to `endpoint`.
backend = "local"

# Directory objects are written to (local backend).
root = "storage"

# Base URL objects are PUT to (http backend, required there).
endpoint = ""

# Base of the public URLs returned for stored objects.
public_base_url = "http://localhost:8080/storage"

# Key prefix for every stored object. Must end with "/".
prefix = "images/"

# ---------------------------------------------------------------------------
# Image metadata
# ---------------------------------------------------------------------------
[records]
# JSON file holding one row per stored image.
path = "records.json"

# ---------------------------------------------------------------------------
# Network deadlines
# ---------------------------------------------------------------------------
[network]
# Seconds allowed for downloading one source image.
fetch_timeout_secs = 30

# Seconds allowed for writing one object.
upload_timeout_secs = 50

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum concurrent item workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 8

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive, e.g. "debug" or "snap_serve=debug,info".
# The RUST_LOG environment variable takes precedence when set.
filter = "info"
"##
}
