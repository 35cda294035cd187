use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{validate_name, CacheEntry, CacheError, CacheStorage};
use crate::models::{CachedResponse, Response};

/// Extension of entry files inside a generation directory
const ENTRY_EXTENSION: &str = "json";

/// Extension of partially written entry files
const TEMP_EXTENSION: &str = "tmp";

/// Cache storage on the local filesystem.
///
/// Layout: `<root>/<generation>/<sha256(key)>.json`, each file holding one
/// serialized [`CacheEntry`].
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root).map_err(CacheError::io(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_path(&self, name: &str) -> Result<PathBuf, CacheError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_file_name(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION)
    }

    async fn is_dir(path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Remove staged temp files that were never renamed into place.
    async fn discard(staged: &[(PathBuf, PathBuf)]) {
        for (temp, _) in staged {
            if let Err(e) = tokio::fs::remove_file(temp).await {
                warn!(path = %temp.display(), error = %e, "Failed to remove staged cache entry");
            }
        }
    }

    async fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(CacheError::io(path))?;
        serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let path = self.generation_path(name)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(CacheError::io(&path))
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        let path = self.generation_path(name)?;
        Ok(Self::is_dir(&path).await)
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(CacheError::io(&self.root))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(CacheError::io(&self.root))? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if validate_name(&name).is_ok() && Self::is_dir(&entry.path()).await {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let path = self.generation_path(name)?;
        if !Self::is_dir(&path).await {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&path)
            .await
            .map_err(CacheError::io(&path))?;
        debug!(generation = name, "Deleted cache generation");
        Ok(true)
    }

    async fn put_all(&self, name: &str, responses: Vec<(String, Response)>) -> Result<(), CacheError> {
        let dir = self.generation_path(name)?;
        if !Self::is_dir(&dir).await {
            return Err(CacheError::NotFound(name.to_string()));
        }

        // Stage every entry first. A failure here removes what was staged and
        // leaves the generation as it was.
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(responses.len());
        for (key, response) in responses {
            let entry = CacheEntry {
                key,
                cached: CachedResponse::new(response),
            };
            let path = dir.join(Self::entry_file_name(&entry.key));
            let temp = path.with_extension(TEMP_EXTENSION);

            let written = match serde_json::to_string_pretty(&entry) {
                Ok(contents) => tokio::fs::write(&temp, contents)
                    .await
                    .map_err(CacheError::io(&temp)),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                Self::discard(&staged).await;
                return Err(e);
            }
            staged.push((temp, path));
        }

        for (i, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = tokio::fs::rename(temp, path).await {
                Self::discard(&staged[i..]).await;
                return Err(CacheError::Io {
                    path: path.clone(),
                    source: e,
                });
            }
        }
        Ok(())
    }

    async fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.generation_path(name)?.join(Self::entry_file_name(key));
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(CacheError::io(&path))?
        {
            return Ok(None);
        }

        let entry = Self::read_entry(&path).await?;
        if entry.key != key {
            // Digest collision or a hand-edited file
            warn!(path = %path.display(), expected = key, found = %entry.key, "Cache entry key mismatch");
            return Ok(None);
        }
        Ok(Some(entry.cached))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let dir_path = self.generation_path(name)?;
        if !Self::is_dir(&dir_path).await {
            return Err(CacheError::NotFound(name.to_string()));
        }

        let mut dir = tokio::fs::read_dir(&dir_path)
            .await
            .map_err(CacheError::io(&dir_path))?;
        let mut entries = Vec::new();
        while let Some(file) = dir.next_entry().await.map_err(CacheError::io(&dir_path))? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, DiskCacheStorage) {
        let dir = TempDir::new().expect("temp dir");
        let storage = DiskCacheStorage::new(dir.path().join("cache")).expect("disk storage");
        (dir, storage)
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let (dir, storage) = storage();
        storage.open("v1").await.expect("open");
        storage
            .put_all(
                "v1",
                vec![(
                    "http://localhost:8000/static/img/favicon.png".to_string(),
                    Response::new("http://localhost:8000/static/img/favicon.png", 200, vec![0x89, b'P', b'N', b'G'])
                        .with_header("Content-Type", "image/png"),
                )],
            )
            .await
            .expect("put");

        // A fresh handle on the same root sees the same data
        let reopened = DiskCacheStorage::new(dir.path().join("cache")).expect("reopen");
        let hit = reopened
            .get("v1", "http://localhost:8000/static/img/favicon.png")
            .await
            .expect("get")
            .expect("hit");
        assert_eq!(hit.response.body, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(hit.response.content_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_keys_ignore_files_and_hidden_dirs() {
        let (_dir, storage) = storage();
        storage.open("v2").await.expect("open");
        storage.open("v1").await.expect("open");
        std::fs::write(storage.root().join("stray.txt"), "x").expect("write stray file");
        std::fs::create_dir_all(storage.root().join("not valid")).expect("create dir");

        assert_eq!(storage.keys().await.expect("keys"), vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn test_delete_removes_generation() {
        let (_dir, storage) = storage();
        storage.open("v1").await.expect("open");
        storage
            .put_all("v1", vec![("http://localhost/".to_string(), Response::new("http://localhost/", 200, "x"))])
            .await
            .expect("put");

        assert!(storage.delete("v1").await.expect("delete"));
        assert!(!storage.has("v1").await.expect("has"));
        assert!(!storage.delete("v1").await.expect("delete again"));
        assert!(storage.get("v1", "http://localhost/").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_entries_sorted_and_skip_corrupt() {
        let (_dir, storage) = storage();
        storage.open("v1").await.expect("open");
        storage
            .put_all(
                "v1",
                vec![
                    ("http://localhost/b".to_string(), Response::new("http://localhost/b", 200, "b")),
                    ("http://localhost/a".to_string(), Response::new("http://localhost/a", 200, "a")),
                ],
            )
            .await
            .expect("put");
        std::fs::write(storage.root().join("v1").join("garbage.json"), "{not json").expect("write garbage");

        let keys: Vec<String> = storage
            .entries("v1")
            .await
            .expect("entries")
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["http://localhost/a", "http://localhost/b"]);
    }

    #[tokio::test]
    async fn test_put_all_requires_open_generation() {
        let (_dir, storage) = storage();
        let result = storage
            .put_all("v9", vec![("http://localhost/".to_string(), Response::new("http://localhost/", 200, ""))])
            .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, storage) = storage();
        assert!(matches!(storage.open("..").await, Err(CacheError::InvalidName(_))));
        assert!(matches!(storage.has("../x").await, Err(CacheError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_put_all_failure_leaves_generation_unchanged() {
        let (_dir, storage) = storage();
        storage.open("v1").await.expect("open");
        storage
            .put_all("v1", vec![("http://localhost/a".to_string(), Response::new("http://localhost/a", 200, "old a"))])
            .await
            .expect("put");

        // Block the staging file of the second key with a directory
        let gen_dir = storage.root().join("v1");
        let blocked = gen_dir
            .join(DiskCacheStorage::entry_file_name("http://localhost/b"))
            .with_extension(TEMP_EXTENSION);
        std::fs::create_dir(&blocked).expect("create blocking dir");

        let result = storage
            .put_all(
                "v1",
                vec![
                    ("http://localhost/a".to_string(), Response::new("http://localhost/a", 200, "new a")),
                    ("http://localhost/b".to_string(), Response::new("http://localhost/b", 200, "b")),
                    ("http://localhost/c".to_string(), Response::new("http://localhost/c", 200, "c")),
                ],
            )
            .await;
        assert!(matches!(result, Err(CacheError::Io { .. })));

        // Nothing from the failed batch is visible
        let hit = storage.get("v1", "http://localhost/a").await.expect("get").expect("hit");
        assert_eq!(hit.response.text(), "old a");
        assert!(storage.get("v1", "http://localhost/b").await.expect("get").is_none());
        assert!(storage.get("v1", "http://localhost/c").await.expect("get").is_none());

        // Only the blocking directory is left besides the original entry
        let leftovers: Vec<_> = std::fs::read_dir(&gen_dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION) && p.is_file())
            .collect();
        assert!(leftovers.is_empty(), "staged files left behind: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_match_url_skips_corrupt_entry() {
        let (_dir, storage) = storage();
        let key = "http://localhost/static/css/style.css";
        for name in ["a-old", "b-current"] {
            storage.open(name).await.expect("open");
            storage
                .put_all(name, vec![(key.to_string(), Response::new(key, 200, name))])
                .await
                .expect("put");
        }
        std::fs::write(
            storage.root().join("b-current").join(DiskCacheStorage::entry_file_name(key)),
            "{not json",
        )
        .expect("corrupt entry");

        assert!(matches!(
            storage.get("b-current", key).await,
            Err(CacheError::Corrupt { .. })
        ));
        let hit = storage
            .match_url(key, Some("b-current"))
            .await
            .expect("match")
            .expect("hit");
        assert_eq!(hit.response.text(), "a-old");
    }
}
