//! Single-flight asset cache.
//!
//! The [`AssetCache`] maps a source URL to a load state. The first request for
//! a URL claims it (`Locked`) and performs the real fetch; concurrent
//! requests for the same URL poll until the entry becomes `Ready` and then
//! receive a deep clone of the canonical asset. The canonical asset itself is
//! never handed out.
//!
//! # Architecture
//!
//! ```text
//! resolve(url) ──► ┌─────────────┐
//!                  │    Claim    │──► Ready  ──► clone canonical asset
//!                  └──────┬──────┘
//!                         │
//!            ┌────────────┴────────────┐
//!            ▼ Vacant                  ▼ Locked
//!     ┌─────────────┐           ┌─────────────┐
//!     │ Owner fetch │           │ Poll every  │──► re-claim
//!     └──────┬──────┘           │ interval    │
//!            │                  └─────────────┘
//!     ok ────┴──── err / dropped
//!     store Ready  remove entry (later requests retry)
//! ```
//!
//! The cache is an explicit service value: construct it once, share it with
//! `Arc`, and drop it to release every cached asset. There is no eviction.
//!
//! # Example
//!
//! ```ignore
//! use geomodel::cache::{AssetCache, CacheConfig};
//!
//! let cache = Arc::new(AssetCache::new(CacheConfig::default()));
//! let asset = cache
//!     .resolve(url, true, || fetcher.fetch(url, options))
//!     .await?;
//! ```

mod coordinator;
mod stats;

pub use coordinator::{AssetCache, EntryState};
pub use stats::CacheStats;

use std::time::Duration;

use thiserror::Error;

use crate::fetch::FetchError;

/// Default interval between re-checks of a locked entry.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cache coordinator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// How often a waiting request re-checks a locked entry.
    pub poll_interval: Duration,
    /// Upper bound on waiting for another request's fetch. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl CacheConfig {
    /// Set the polling interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the maximum time a request waits for an in-flight fetch.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Errors returned by [`AssetCache::resolve`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    /// The underlying fetch failed. The entry was released.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Gave up waiting for another request's fetch of the same URL.
    #[error("Timed out after {waited:?} waiting for in-flight fetch of {url}")]
    WaitTimeout { url: String, waited: Duration },
}
