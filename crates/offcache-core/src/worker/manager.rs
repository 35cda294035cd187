use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::{Method, Url};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{LifecycleError, StaticManifest, WorkerError, WorkerState};
use crate::cache::{CacheError, CacheStorage};
use crate::models::{cache_key, Request, Response};
use crate::network::{FetchError, Network};

/// Requests whose URL contains this are never intercepted.
pub const API_PATH_MARKER: &str = "/api/";

/// True for dynamic API requests, which must never be served from or
/// written to the static cache.
pub fn is_api_request(url: &Url) -> bool {
    url.as_str().contains(API_PATH_MARKER)
}

/// What the manager did with a request.
#[derive(Debug)]
pub enum Interception {
    /// Not handled. The host sends the request to the network itself.
    Bypass,
    /// The network answered, whatever the status.
    Network(Response),
    /// The network failed and the cache had the URL.
    Cache(Response),
    /// The network failed and the cache had nothing. No response.
    Failed(FetchError),
}

impl Interception {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Interception::Network(r) | Interception::Cache(r) => Some(r),
            Interception::Bypass | Interception::Failed(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Interception::Network(r) | Interception::Cache(r) => Some(r),
            Interception::Bypass | Interception::Failed(_) => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Interception::Bypass => "pass-through",
            Interception::Network(_) => "network",
            Interception::Cache(_) => "cache",
            Interception::Failed(_) => "failed",
        }
    }
}

/// Network-first offline cache over a fixed static asset manifest.
///
/// Share it behind an `Arc`; every handler takes `&self`.
pub struct OfflineCacheManager<N: Network, S: CacheStorage> {
    network: Arc<N>,
    storage: Arc<S>,
    manifest: StaticManifest,
    state: RwLock<WorkerState>,
}

impl<N: Network, S: CacheStorage> OfflineCacheManager<N, S> {
    pub fn new(network: Arc<N>, storage: Arc<S>, manifest: StaticManifest) -> Self {
        Self {
            network,
            storage,
            manifest,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn manifest(&self) -> &StaticManifest {
        &self.manifest
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Pick up where a previous run left off.
    ///
    /// If every manifest asset is already stored in the current generation,
    /// the manager treats it as installed and runs the normal `activate`
    /// purge, so no stale generation survives. An incomplete or missing
    /// generation is left alone and the manager stays `Parsed`. Returns
    /// whether the manager now controls requests.
    pub async fn restore(&self) -> Result<bool, WorkerError> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Parsed {
                return Ok(state.controls_requests());
            }
            let version = self.manifest.version().as_str();
            if !self.is_complete(version).await? {
                debug!(version = version, "No complete cache generation to restore");
                return Ok(false);
            }
            debug!(version = version, "Restoring installed cache generation");
            *state = WorkerState::Installed;
        }

        self.activate().await?;
        Ok(true)
    }

    /// True when the generation exists and holds an entry for every asset.
    async fn is_complete(&self, version: &str) -> Result<bool, CacheError> {
        if !self.storage.has(version).await? {
            return Ok(false);
        }
        for url in self.manifest.assets() {
            if self.storage.get(version, &cache_key(url)).await?.is_none() {
                warn!(version = version, url = %url, "Cache generation is missing an asset");
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ===== Install =====

    /// Fetch every manifest asset, then open the current generation and
    /// store them in it.
    ///
    /// Any asset that fails to fetch, or answers with a non-2xx status,
    /// aborts the install before the generation is even created. Older
    /// generations are left untouched and the manager becomes `Redundant`.
    pub async fn install(&self) -> Result<(), WorkerError> {
        {
            let mut state = self.state.write().await;
            if !state.can_install() {
                return Err(LifecycleError {
                    operation: "install",
                    state: *state,
                }
                .into());
            }
            *state = WorkerState::Installing;
        }

        let version = self.manifest.version().as_str();
        info!(version = version, assets = self.manifest.assets().len(), "Installing cache generation");

        match self.populate(version).await {
            Ok(()) => {
                *self.state.write().await = WorkerState::Installed;
                info!(version = version, "Cache generation installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                warn!(version = version, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    async fn populate(&self, version: &str) -> Result<(), WorkerError> {
        let responses = try_join_all(self.manifest.assets().iter().map(|url| self.fetch_asset(url))).await?;

        // Nothing touches storage until every asset is in hand
        self.storage.open(version).await?;
        self.storage.put_all(version, responses).await?;
        Ok(())
    }

    async fn fetch_asset(&self, url: &Url) -> Result<(String, Response), WorkerError> {
        let response = self
            .network
            .fetch(&Request::get(url.clone()))
            .await
            .map_err(|source| WorkerError::AssetFetch {
                url: url.to_string(),
                source,
            })?;

        if !response.is_ok() {
            return Err(WorkerError::BadStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        debug!(url = %url, bytes = response.body.len(), "Fetched static asset");
        Ok((cache_key(url), response))
    }

    // ===== Activate =====

    /// Delete every generation other than the current one and take control
    /// of requests. Returns the names of the deleted generations.
    ///
    /// A generation that fails to delete is logged and skipped.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        {
            let mut state = self.state.write().await;
            if !state.can_activate() {
                return Err(LifecycleError {
                    operation: "activate",
                    state: *state,
                }
                .into());
            }
            *state = WorkerState::Activating;
        }

        let current = self.manifest.version().as_str();
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                *self.state.write().await = WorkerState::Installed;
                return Err(e.into());
            }
        };

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| name.as_str() != current) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    info!(generation = %name, "Deleted stale cache generation");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => warn!(generation = %name, error = %e, "Failed to delete stale cache generation"),
            }
        }

        *self.state.write().await = WorkerState::Activated;
        info!(version = current, deleted = deleted.len(), "Cache generation activated");
        Ok(deleted)
    }

    // ===== Fetch =====

    /// Handle one outgoing request.
    ///
    /// API requests, and every request before activation, are bypassed.
    /// Everything else goes to the network first; on a transport failure the
    /// cache is consulted. Nothing is ever written to the cache here.
    pub async fn intercept(&self, request: &Request) -> Interception {
        if is_api_request(&request.url) {
            debug!(url = %request.url, "API request, not intercepting");
            return Interception::Bypass;
        }
        if !self.state().await.controls_requests() {
            return Interception::Bypass;
        }

        let error = match self.network.fetch(request).await {
            Ok(response) => return Interception::Network(response),
            Err(e) => e,
        };

        debug!(url = %request.url, connect = error.is_connect(), error = %error, "Network failed, trying cache");

        // The cache only answers GET requests
        if request.method != Method::GET {
            return Interception::Failed(error);
        }

        let key = request.cache_key();
        match self
            .storage
            .match_url(&key, Some(self.manifest.version().as_str()))
            .await
        {
            Ok(Some(cached)) => {
                debug!(url = %key, age = %cached.age_display(), "Serving from cache");
                Interception::Cache(cached.response)
            }
            Ok(None) => Interception::Failed(error),
            Err(e) => {
                warn!(url = %key, error = %e, "Cache lookup failed");
                Interception::Failed(error)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
