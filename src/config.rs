//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. a `--config <path>` flag of the embedding binary)
//! 2. `~/.muxcdn/config.toml` (user)
//! 3. `/etc/muxcdn/config.toml` (system)
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::{MuxcdnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Static file serving.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Directory requests are resolved against (default: /var/www/html).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// File served for `/`, relative to `root` (default: index.html).
    /// An empty string disables it.
    #[serde(default = "default_file")]
    pub default_file: Option<String>,
    /// Glob patterns a path must match to be served.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,
    /// Glob patterns that are never served, even when whitelisted.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_file: default_file(),
            whitelist: default_whitelist(),
            blacklist: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/www/html")
}

fn default_file() -> Option<String> {
    Some("index.html".to_string())
}

fn default_whitelist() -> Vec<String> {
    vec!["/var/www/html/*".to_string()]
}

/// File cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// How long loaded files stay fresh, in milliseconds (default: 60000).
    /// 0 reloads on every request.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    60_000
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new().ttl(Duration::from_millis(section.ttl_ms))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muxcdn/config.toml`
    /// 3. `/etc/muxcdn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            MuxcdnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            MuxcdnError::Configuration(msg) => {
                MuxcdnError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MuxcdnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MuxcdnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muxcdn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muxcdn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MuxcdnError::Configuration(
            "No config file found. Create ~/.muxcdn/config.toml or /etc/muxcdn/config.toml"
                .to_string(),
        ))
    }
}
