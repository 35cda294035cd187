use thiserror::Error;

/// A transport-level failure: no HTTP response was obtained.
///
/// HTTP error statuses are not errors at this layer. A 404 or 500 is a
/// perfectly good `Response` and is returned as such.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Host unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for URLs echoed into error messages
const MAX_ERROR_URL_LENGTH: usize = 200;

impl FetchError {
    /// Truncate a URL to avoid logging excessive data
    fn truncate_url(url: &str) -> String {
        if url.len() <= MAX_ERROR_URL_LENGTH {
            url.to_string()
        } else {
            let head: String = url.chars().take(MAX_ERROR_URL_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, url.len())
        }
    }

    pub fn unreachable(url: &str) -> Self {
        FetchError::Unreachable(Self::truncate_url(url))
    }

    /// True when the failure happened before any bytes came back, e.g. DNS
    /// or connect errors. Timeouts mid-body also count as transport failures
    /// but are reported as `false` here.
    pub fn is_connect(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_connect(),
            FetchError::Unreachable(_) => true,
            FetchError::InvalidRequest(_) => false,
        }
    }
}
