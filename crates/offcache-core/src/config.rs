//! Application configuration management.
//!
//! Holds the origin the static manifest is resolved against, the cache
//! storage location, the HTTP timeout and an optional log file. The manifest
//! itself and the cache version label are compiled in and not configurable.
//!
//! Configuration is stored at `~/.config/offcache/config.json`. A missing
//! file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::network::client::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "offcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin serving the dashboard during local development
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000/";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub origin: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// A config with every default spelled out, as written by `config --init`.
    pub fn with_defaults() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            origin: Some(DEFAULT_ORIGIN.to_string()),
            cache_dir: Some(defaults.cache_dir()?),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_file: None,
        })
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn origin(&self) -> Result<Url> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let url = Url::parse(origin).with_context(|| format!("Invalid origin URL: {}", origin))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("Origin URL cannot resolve relative paths: {}", origin);
        }
        Ok(url)
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
