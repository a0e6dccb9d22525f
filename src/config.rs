use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::source::PackageSource;
use crate::transport::DEFAULT_USER_AGENT;

// =============================================================================
// Time-related constants
// =============================================================================

/// Version listings are kept briefly so new releases show up (10 minutes)
pub const DEFAULT_VERSIONS_TTL_MS: u64 = 10 * 60 * 1000;

/// Catalogs of a published version never change (24 hours)
pub const DEFAULT_CATALOG_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Failed catalog fetches are retried after 5 minutes
pub const DEFAULT_CATALOG_ERROR_TTL_MS: u64 = 5 * 60 * 1000;

/// Resolved symbols (1 hour)
pub const DEFAULT_RESOLUTION_TTL_MS: u64 = 60 * 60 * 1000;

/// Timeout for HTTP requests in milliseconds (30 seconds)
pub const HTTP_TIMEOUT_MS: u64 = 30_000;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "PACKAGE_LENS_CONFIG";

/// Top level configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub cache: CacheConfig,
    /// Package sources in failover order
    pub sources: Vec<PackageSource>,
    pub resolver: ResolverConfig,
    pub http: HttpConfig,
    pub catalog: CatalogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            sources: vec![PackageSource::nuget_org()],
            resolver: ResolverConfig::default(),
            http: HttpConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub versions_ttl: u64,
    pub catalog_ttl: u64,
    /// 0 disables caching of failed catalog fetches
    pub catalog_error_ttl: u64,
    pub resolution_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            versions_ttl: DEFAULT_VERSIONS_TTL_MS,
            catalog_ttl: DEFAULT_CATALOG_TTL_MS,
            catalog_error_ttl: DEFAULT_CATALOG_ERROR_TTL_MS,
            resolution_ttl: DEFAULT_RESOLUTION_TTL_MS,
        }
    }
}

impl CacheConfig {
    pub fn versions_ttl(&self) -> Duration {
        Duration::from_millis(self.versions_ttl)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_millis(self.catalog_ttl)
    }

    pub fn catalog_error_ttl(&self) -> Duration {
        Duration::from_millis(self.catalog_error_ttl)
    }

    pub fn resolution_ttl(&self) -> Duration {
        Duration::from_millis(self.resolution_ttl)
    }
}

/// Dependency graph resolver configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Package id prefixes searched after every other dependency
    pub reserved_prefixes: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reserved_prefixes: vec![
                "System.".to_string(),
                "Microsoft.".to_string(),
                "runtime.".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub user_agent: String,
    /// Request timeout in milliseconds
    pub timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: HTTP_TIMEOUT_MS,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Read documentation XML to find types that are not assembly names
    pub load_xml_docs: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            load_xml_docs: true,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from `explicit`, else `$PACKAGE_LENS_CONFIG`, else the default
    /// config file if present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        match path {
            Some(path) => Self::from_file(&path),
            None => {
                let default_path = config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Returns the path to the data directory for package-lens.
/// Uses $XDG_DATA_HOME/package-lens if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/package-lens,
/// or ./package-lens if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("package-lens.log")
}

/// Returns the path to the default config file.
pub fn config_path() -> PathBuf {
    config_dir_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
        .join("config.json")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("package-lens")
}

fn config_dir_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("package-lens")
}
