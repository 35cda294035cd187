//! Versioned cache storage for offline access.
//!
//! A cache is a set of named generations. Each generation maps a request
//! URL (the cache key) to the response stored for it. The offline cache
//! manager writes one generation per version label and deletes the others
//! on activation.
//!
//! Backends:
//! - `MemoryCacheStorage`: process-local, used in tests and for dry runs
//! - `DiskCacheStorage`: one directory per generation, one JSON file per entry

pub mod disk;
pub mod error;
pub mod storage;

use serde::{Deserialize, Serialize};

use crate::models::CachedResponse;

pub use disk::DiskCacheStorage;
pub use error::CacheError;
pub use storage::{CacheStorage, MemoryCacheStorage};

/// Maximum length of a generation name in bytes.
pub const MAX_NAME_LENGTH: usize = 128;

/// A stored entry together with the key it was stored under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub cached: CachedResponse,
}

/// Check that a generation name is usable as a directory name on every
/// platform: ASCII letters, digits, `-`, `_` and `.`, and not `.` or `..`.
pub fn validate_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}
