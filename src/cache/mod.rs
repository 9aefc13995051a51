//! Caching subsystem.
//!
//! [`CoalescingCache`] memoizes the result of an expensive load per key,
//! runs at most one load per key at a time and expires results after a
//! configured TTL. [`StaticFiles`](crate::files::StaticFiles) owns one
//! instance for file contents; see [`coalescing`] for the full contract.

pub mod coalescing;

pub use coalescing::{CacheError, CoalescingCache};

use std::time::Duration;

/// Configuration for a [`CoalescingCache`].
///
/// ```rust
/// # use muxcdn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new().ttl(Duration::from_secs(30));
/// assert_eq!(config.ttl, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a loaded result stays fresh. `Duration::ZERO` disables
    /// caching (every lookup reloads). Default: 1 minute.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for loaded results.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
