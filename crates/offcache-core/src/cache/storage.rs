use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use super::{validate_name, CacheEntry, CacheError};
use crate::models::{CachedResponse, Response};

/// Storage for named cache generations.
///
/// Keys within a generation are cache keys as produced by
/// [`crate::models::cache_key`]. Implementations must be safe to share
/// between concurrent requests.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Names of all generations, sorted.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Remove a generation and every entry in it. Returns false if it did
    /// not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store every response under its key, replacing existing entries with
    /// the same key. The generation must have been opened.
    async fn put_all(&self, name: &str, responses: Vec<(String, Response)>) -> Result<(), CacheError>;

    async fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, CacheError>;

    /// All entries in a generation, sorted by key.
    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError>;

    /// Look a key up across generations. The preferred generation is
    /// searched first, then the rest in name order. An unreadable entry is
    /// logged and the search moves on, as `entries` does.
    async fn match_url(
        &self,
        key: &str,
        preferred: Option<&str>,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let mut names = self.keys().await?;
        if let Some(name) = preferred {
            names.retain(|n| n != name);
            names.insert(0, name.to_string());
        }

        for name in names {
            match self.get(&name, key).await {
                Ok(Some(hit)) => return Ok(Some(hit)),
                Ok(None) => {}
                Err(e) => warn!(generation = %name, key = key, error = %e, "Skipping unreadable cache entry"),
            }
        }
        Ok(None)
    }
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    generations: RwLock<BTreeMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        validate_name(name)?;
        self.generations
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.generations.read().await.contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.generations.write().await.remove(name).is_some())
    }

    async fn put_all(&self, name: &str, responses: Vec<(String, Response)>) -> Result<(), CacheError> {
        let mut generations = self.generations.write().await;
        let generation = generations
            .get_mut(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        for (key, response) in responses {
            generation.insert(key, CachedResponse::new(response));
        }
        Ok(())
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .generations
            .read()
            .await
            .get(name)
            .and_then(|generation| generation.get(key))
            .cloned())
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let generations = self.generations.read().await;
        let generation = generations
            .get(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        let mut entries: Vec<CacheEntry> = generation
            .iter()
            .map(|(key, cached)| CacheEntry {
                key: key.clone(),
                cached: cached.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
