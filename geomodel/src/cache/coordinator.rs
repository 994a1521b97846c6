//! The single-flight cache coordinator.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CacheConfig, CacheError, CacheStats};
use crate::asset::GltfAsset;
use crate::fetch::FetchError;

/// Public view of an entry's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// A fetch is in flight.
    Locked,
    /// The canonical asset is stored.
    Ready,
}

enum CacheEntry {
    Locked { since: Instant },
    Ready(Arc<GltfAsset>),
}

enum Claim {
    Owner,
    Ready(Arc<GltfAsset>),
    Locked { since: Instant },
}

/// URL-keyed asset cache with single-flight fetches.
///
/// At most one entry exists per URL. The claim step is one `DashMap::entry`
/// call with no await point, so exactly one concurrent caller becomes the
/// owner and runs its fetch; the others poll.
pub struct AssetCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    fetches: AtomicU64,
    hits: AtomicU64,
    waits: AtomicU64,
    failures: AtomicU64,
    abandoned: AtomicU64,
    bypassed: AtomicU64,
}

impl AssetCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            fetches: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolves `url` to an independently owned asset.
    ///
    /// With `use_cache == false` the cache is bypassed and `fetch` runs
    /// directly. Otherwise the caller either owns the fetch, clones a ready
    /// entry, or waits for another caller's fetch. `fetch` runs at most once
    /// per call, and only when this caller owns the entry.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Fetch`] if this caller's fetch failed (the entry is
    ///   released so a later request can retry)
    /// - [`CacheError::WaitTimeout`] if `max_wait` elapsed while waiting
    pub async fn resolve<F, Fut>(
        &self,
        url: &str,
        use_cache: bool,
        fetch: F,
    ) -> Result<GltfAsset, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GltfAsset, FetchError>>,
    {
        if !use_cache {
            self.bypassed.fetch_add(1, Ordering::Relaxed);
            debug!(url, "Cache bypassed");
            return fetch().await.map_err(CacheError::from);
        }

        let mut wait_started: Option<Instant> = None;
        loop {
            match self.claim(url) {
                Claim::Owner => break,
                Claim::Ready(canonical) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(url, "Cache hit, cloning canonical asset");
                    return Ok(canonical.as_ref().clone());
                }
                Claim::Locked { since } => {
                    let started = match wait_started {
                        Some(started) => started,
                        None => {
                            self.waits.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                url,
                                locked_for_ms = since.elapsed().as_millis() as u64,
                                "Fetch in flight, waiting"
                            );
                            *wait_started.insert(Instant::now())
                        }
                    };

                    if let Some(max_wait) = self.config.max_wait {
                        let waited = started.elapsed();
                        if waited >= max_wait {
                            warn!(url, waited_ms = waited.as_millis() as u64, "Gave up waiting for fetch");
                            return Err(CacheError::WaitTimeout {
                                url: url.to_string(),
                                waited,
                            });
                        }
                    }

                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }

        self.fetch_as_owner(url, fetch).await
    }

    async fn fetch_as_owner<F, Fut>(&self, url: &str, fetch: F) -> Result<GltfAsset, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GltfAsset, FetchError>>,
    {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let mut lock = EntryLock::new(self, url);
        let start = Instant::now();
        debug!(url, "Entry locked, fetching");

        match fetch().await {
            Ok(asset) => {
                let canonical = Arc::new(asset);
                let delivered = canonical.as_ref().clone();
                lock.commit(canonical);
                info!(
                    url,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Model cached"
                );
                Ok(delivered)
            }
            Err(e) => {
                lock.fail();
                warn!(url, error = %e, "Fetch failed, releasing entry");
                Err(CacheError::Fetch(e))
            }
        }
    }

    /// Atomically inspects the entry for `url`, locking it if vacant.
    fn claim(&self, url: &str) -> Claim {
        match self.entries.entry(url.to_string()) {
            Entry::Occupied(occupied) => match occupied.get() {
                CacheEntry::Ready(asset) => Claim::Ready(Arc::clone(asset)),
                CacheEntry::Locked { since } => Claim::Locked { since: *since },
            },
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::Locked {
                    since: Instant::now(),
                });
                Claim::Owner
            }
        }
    }

    /// Current state of the entry for `url`.
    pub fn state(&self, url: &str) -> Option<EntryState> {
        self.entries.get(url).map(|entry| match entry.value() {
            CacheEntry::Locked { .. } => EntryState::Locked,
            CacheEntry::Ready(_) => EntryState::Ready,
        })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn is_ready(&self, url: &str) -> bool {
        self.state(url) == Some(EntryState::Ready)
    }

    /// Number of entries, locked or ready.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every ready entry. In-flight fetches keep their locks.
    pub fn clear(&self) {
        self.entries
            .retain(|_, entry| matches!(entry, CacheEntry::Locked { .. }));
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            ..Default::default()
        };
        for entry in self.entries.iter() {
            match entry.value() {
                CacheEntry::Locked { .. } => stats.locked_entries += 1,
                CacheEntry::Ready(_) => stats.ready_entries += 1,
            }
        }
        stats
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Ownership of a locked entry.
///
/// Dropping the lock without committing (fetch error, or the owning future
/// being dropped) removes the entry so waiters and later requests can retry.
/// An uncommitted lock that was never marked failed counts as abandoned.
struct EntryLock<'a> {
    cache: &'a AssetCache,
    url: &'a str,
    committed: bool,
    failed: bool,
}

impl<'a> EntryLock<'a> {
    fn new(cache: &'a AssetCache, url: &'a str) -> Self {
        Self {
            cache,
            url,
            committed: false,
            failed: false,
        }
    }

    fn fail(&mut self) {
        self.failed = true;
    }

    fn commit(mut self, asset: Arc<GltfAsset>) {
        self.cache
            .entries
            .insert(self.url.to_string(), CacheEntry::Ready(asset));
        self.committed = true;
    }
}

impl Drop for EntryLock<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let counter = if self.failed {
            &self.cache.failures
        } else {
            &self.cache.abandoned
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let removed = self
            .cache
            .entries
            .remove_if(self.url, |_, entry| matches!(entry, CacheEntry::Locked { .. }));
        if removed.is_some() {
            debug!(url = self.url, "Released lock on failed or abandoned fetch");
        }
    }
}
