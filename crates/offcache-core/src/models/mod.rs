//! Request and response models shared by the network and cache layers.
//!
//! - `Request`: an outgoing request as seen by the intercept handler
//! - `Response`: any response obtained from the network, whatever its status
//! - `CachedResponse`: a stored response with its write timestamp

pub mod request;
pub mod response;

pub use request::{cache_key, Request};
pub use response::{CachedResponse, Response};
