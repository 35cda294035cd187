use thiserror::Error;

use super::WorkerState;
use crate::cache::CacheError;
use crate::network::FetchError;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Invalid cache version label: {0:?}")]
    InvalidVersion(String),

    #[error("Cannot resolve asset {path:?}: {reason}")]
    InvalidAsset { path: String, reason: String },

    #[error("Duplicate asset in manifest: {0}")]
    DuplicateAsset(String),
}

#[derive(Error, Debug)]
#[error("Cannot {operation} while {state}")]
pub struct LifecycleError {
    pub operation: &'static str,
    pub state: WorkerState,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to fetch asset {url}: {source}")]
    AssetFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Asset {url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Cache storage error: {0}")]
    Storage(#[from] CacheError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
