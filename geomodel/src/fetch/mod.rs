//! Asset fetch mechanism.
//!
//! The loader never downloads or decodes on its own; it goes through an
//! [`AssetFetcher`]. This keeps network access injectable, so tests can count
//! fetches with a mock and applications can swap transports.
//!
//! # Example
//!
//! ```ignore
//! use geomodel::fetch::{AssetFetcher, HttpAssetFetcher};
//!
//! let fetcher = HttpAssetFetcher::new()?;
//! let mut options = fetcher.default_options();
//! options.headers.push(("Authorization".into(), "Bearer token".into()));
//! let asset = fetcher.fetch("https://example.com/truck.glb", options).await?;
//! ```

mod http;

pub use http::{HttpAssetFetcher, DEFAULT_USER_AGENT};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::asset::GltfAsset;

/// Default request timeout for model downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised while retrieving or decoding a model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Transport-level failure (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Local file could not be read.
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    /// Bytes were retrieved but are not a valid model.
    #[error("Failed to decode model: {0}")]
    Decode(String),
}

/// Fetch settings that callers may adjust before a fetch runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Overall request timeout.
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl LoaderOptions {
    /// Adds a request header, returning `self` for chaining.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Retrieves and decodes a model asset.
///
/// Implementations must be `Send + Sync` so one fetcher can serve many
/// concurrent loads.
pub trait AssetFetcher: Send + Sync {
    /// Retrieves the model at `url` and decodes it.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: LoaderOptions,
    ) -> BoxFuture<'a, Result<GltfAsset, FetchError>>;

    /// Options handed to `on_loader_ready` callbacks before each fetch.
    fn default_options(&self) -> LoaderOptions {
        LoaderOptions::default()
    }
}
