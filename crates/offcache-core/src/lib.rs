//! offcache-core - offline cache for the analytics dashboard's static shell.
//!
//! This crate contains the platform-agnostic pieces:
//! - `worker`: install / intercept / activate over a versioned cache
//! - `cache`: cache generation storage (memory and disk)
//! - `network`: the transport seam and its HTTP implementation
//! - `models`: request and response types
//! - `config`: on-disk configuration
//! - `utils`: display formatting

pub mod cache;
pub mod config;
pub mod models;
pub mod network;
pub mod utils;
pub mod worker;

pub use cache::{CacheError, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use config::Config;
pub use models::{CachedResponse, Request, Response};
pub use network::{FetchError, HttpNetwork, Network};
pub use worker::{
    Interception, OfflineCacheManager, StaticManifest, WorkerError, WorkerState,
};
