//! Cache statistics.

use std::fmt;

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Real fetches started by owning requests.
    pub fetches: u64,
    /// Requests served by cloning a ready entry.
    pub hits: u64,
    /// Requests that found a locked entry and had to wait (counted once per request).
    pub waits: u64,
    /// Owned fetches that returned an error.
    pub failures: u64,
    /// Owned fetches dropped before finishing, e.g. by a destroyed instance.
    pub abandoned: u64,
    /// Requests that bypassed the cache.
    pub bypassed: u64,
    /// Entries currently ready.
    pub ready_entries: usize,
    /// Entries currently locked by an in-flight fetch.
    pub locked_entries: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetches, {} hits, {} waits, {} failures, {} abandoned, {} bypassed ({} ready, {} locked)",
            self.fetches,
            self.hits,
            self.waits,
            self.failures,
            self.abandoned,
            self.bypassed,
            self.ready_entries,
            self.locked_entries
        )
    }
}
