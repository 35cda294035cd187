//! Network seam for the offline cache manager.
//!
//! The manager never talks to `reqwest` directly. It goes through the
//! `Network` trait so the lifecycle can be driven against a real origin
//! (`HttpNetwork`) or a scripted one in tests.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{Request, Response};

pub use client::HttpNetwork;
pub use error::FetchError;

/// Something that can turn a request into a response.
#[async_trait]
pub trait Network: Send + Sync {
    /// Send the request. `Ok` for any response the server produced, whatever
    /// its status; `Err` only for transport-level failures.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
