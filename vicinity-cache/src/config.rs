//! Cache sizing and lifetimes.
#![forbid(unsafe_code)]

use std::time::Duration;

/// Default L1 entries per cache kind.
pub const DEFAULT_L1_CAPACITY: usize = 500;

/// Default lifetime of shared L2 entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of entries in the in-process fallback store.
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(5 * 60);

/// Longest entry lifetime the stores honour; longer lifetimes are shortened.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default entry cap of the in-process fallback store.
pub const DEFAULT_FALLBACK_CAPACITY: usize = 10_000;

/// Configuration for [`TileCache`](crate::TileCache).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vicinity_cache::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_l1_capacity(64)
///     .with_ttl(Duration::from_secs(30));
/// assert_eq!(config.l1_capacity, 64);
/// assert_eq!(config.effective_fallback_ttl(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum L1 entries per cache kind.
    pub l1_capacity: usize,
    /// Lifetime of L1 and shared L2 entries.
    pub ttl: Duration,
    /// Lifetime of entries written to the in-process fallback.
    pub fallback_ttl: Duration,
    /// Maximum entries held by the in-process fallback.
    pub fallback_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: DEFAULT_L1_CAPACITY,
            ttl: DEFAULT_TTL,
            fallback_ttl: DEFAULT_FALLBACK_TTL,
            fallback_capacity: DEFAULT_FALLBACK_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Set the L1 capacity per kind.
    #[must_use]
    pub const fn with_l1_capacity(mut self, capacity: usize) -> Self {
        self.l1_capacity = capacity;
        self
    }

    /// Set the entry lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the fallback lifetime.
    #[must_use]
    pub const fn with_fallback_ttl(mut self, ttl: Duration) -> Self {
        self.fallback_ttl = ttl;
        self
    }

    /// Set the fallback entry cap.
    #[must_use]
    pub const fn with_fallback_capacity(mut self, capacity: usize) -> Self {
        self.fallback_capacity = capacity;
        self
    }

    /// Lifetime applied to fallback writes: never longer than `ttl`.
    #[must_use]
    pub fn effective_fallback_ttl(&self) -> Duration {
        self.fallback_ttl.min(self.ttl)
    }
}
