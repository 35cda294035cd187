//! Offline cache manager: the install, fetch-intercept and activate
//! handlers of a network-first offline cache.
//!
//! Lifecycle:
//! 1. `install` opens the generation named by the manifest's version label
//!    and stores every static asset, all or nothing
//! 2. `activate` deletes every other generation and takes control
//! 3. `intercept` serves requests network-first, falling back to the cache
//!    on transport failure. `/api/` requests are never touched.

pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod manifest;

pub use error::{LifecycleError, ManifestError, WorkerError};
pub use lifecycle::WorkerState;
pub use manager::{is_api_request, Interception, OfflineCacheManager, API_PATH_MARKER};
pub use manifest::{CacheVersion, StaticManifest};
