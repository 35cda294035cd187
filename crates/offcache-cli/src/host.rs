//! The hosting runtime for the offline cache manager.
//!
//! `Host::start` is the startup sequence: every dependency is built once,
//! in order, and handed to the manager explicitly. Nothing is looked up
//! globally afterwards.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::info;

use offcache_core::{Config, DiskCacheStorage, HttpNetwork, OfflineCacheManager, StaticManifest};

pub type Manager = OfflineCacheManager<HttpNetwork, DiskCacheStorage>;

pub struct Host {
    pub origin: Url,
    pub network: Arc<HttpNetwork>,
    pub storage: Arc<DiskCacheStorage>,
    pub manager: Manager,
}

impl Host {
    pub fn start(config: &Config) -> Result<Self> {
        let origin = config.origin()?;

        let network = Arc::new(
            HttpNetwork::with_timeout(config.request_timeout())
                .context("Failed to build HTTP client")?,
        );

        let cache_dir = config.cache_dir()?;
        let storage = Arc::new(
            DiskCacheStorage::new(cache_dir.clone())
                .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?,
        );

        let manifest = StaticManifest::dashboard(&origin)?;
        info!(
            origin = %origin,
            cache_dir = %cache_dir.display(),
            version = %manifest.version(),
            "Host started"
        );

        let manager = OfflineCacheManager::new(network.clone(), storage.clone(), manifest);

        Ok(Self {
            origin,
            network,
            storage,
            manager,
        })
    }

    /// Accept either an absolute URL or a path relative to the origin.
    pub fn resolve(&self, target: &str) -> Result<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(_) => self
                .origin
                .join(target)
                .with_context(|| format!("Invalid URL or path: {}", target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host(dir: &std::path::Path) -> Host {
        let config = Config {
            origin: Some("http://localhost:8000/".to_string()),
            cache_dir: Some(dir.join("cache")),
            ..Config::default()
        };
        Host::start(&config).unwrap()
    }

    #[test]
    fn test_resolve_paths_against_origin() {
        let dir = TempDir::new().unwrap();
        let host = host(dir.path());

        assert_eq!(
            host.resolve("/static/js/main.js").unwrap().as_str(),
            "http://localhost:8000/static/js/main.js"
        );
        assert_eq!(
            host.resolve("https://cdn.example.com/x.css").unwrap().as_str(),
            "https://cdn.example.com/x.css"
        );
    }

    #[test]
    fn test_start_creates_cache_dir() {
        let dir = TempDir::new().unwrap();
        let host = host(dir.path());

        assert!(host.storage.root().is_dir());
        assert_eq!(host.manager.manifest().assets().len(), 4);
    }
}
