use std::collections::HashSet;
use std::fmt;

use reqwest::Url;

use super::ManifestError;
use crate::cache::validate_name;
use crate::models::cache_key;

/// Version label of the dashboard's static cache.
/// Bump whenever `DASHBOARD_ASSETS` changes so clients re-populate and the
/// previous generation is purged.
pub const DASHBOARD_CACHE_VERSION: &str = "spotify-analytics-v1";

/// Static assets guaranteed to be available offline.
pub const DASHBOARD_ASSETS: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/main.js",
    "/static/img/favicon.png",
];

/// A validated cache generation label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(label: impl Into<String>) -> Result<Self, ManifestError> {
        let label = label.into();
        match validate_name(&label) {
            Ok(()) => Ok(Self(label)),
            Err(_) => Err(ManifestError::InvalidVersion(label)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The version label plus the ordered list of asset URLs stored at install.
#[derive(Debug, Clone)]
pub struct StaticManifest {
    version: CacheVersion,
    assets: Vec<Url>,
}

impl StaticManifest {
    /// Resolve each asset path against `origin`. Absolute URLs are kept as
    /// they are. The same URL listed twice is rejected.
    pub fn new<S: AsRef<str>>(version: &str, origin: &Url, paths: &[S]) -> Result<Self, ManifestError> {
        let version = CacheVersion::new(version)?;

        let mut seen = HashSet::new();
        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let url = origin.join(path).map_err(|e| ManifestError::InvalidAsset {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
            if !seen.insert(cache_key(&url)) {
                return Err(ManifestError::DuplicateAsset(url.to_string()));
            }
            assets.push(url);
        }

        Ok(Self { version, assets })
    }

    /// The compiled-in dashboard manifest.
    pub fn dashboard(origin: &Url) -> Result<Self, ManifestError> {
        Self::new(DASHBOARD_CACHE_VERSION, origin, DASHBOARD_ASSETS)
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    pub fn assets(&self) -> &[Url] {
        &self.assets
    }
}
