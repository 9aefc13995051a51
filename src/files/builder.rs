//! Builder for configuring [`StaticFiles`] instances

use std::path::PathBuf;
use std::sync::Arc;

use super::{AccessPolicy, ContentSource, DiskSource, StaticFiles};
use crate::cache::{CacheConfig, CoalescingCache};

/// Builder for configuring [`StaticFiles`].
///
/// ```rust
/// # use muxcdn::{AccessPolicy, CacheConfig, StaticFiles};
/// # use std::time::Duration;
/// let files = StaticFiles::builder("/var/www/html")
///     .default_file("index.html")
///     .policy(AccessPolicy::from_patterns(&["/var/www/html/*"], &[])?)
///     .cache(CacheConfig::new().ttl(Duration::from_secs(30)))
///     .build();
/// # Ok::<(), muxcdn::MuxcdnError>(())
/// ```
pub struct StaticFilesBuilder {
    root: PathBuf,
    default_file: Option<String>,
    policy: AccessPolicy,
    source: Arc<dyn ContentSource>,
    cache: CacheConfig,
}

impl StaticFilesBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_file: None,
            policy: AccessPolicy::default(),
            source: Arc::new(DiskSource),
            cache: CacheConfig::default(),
        }
    }

    /// File served for `/`, relative to the root. Empty disables it.
    pub fn default_file(mut self, file: impl Into<String>) -> Self {
        let file = file.into();
        self.default_file = (!file.is_empty()).then_some(file);
        self
    }

    /// Set the access policy (default: deny everything).
    pub fn policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the content source (default: [`DiskSource`]).
    pub fn source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = source;
        self
    }

    /// Configure the file cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn build(self) -> StaticFiles {
        StaticFiles {
            root: self.root,
            default_file: self.default_file,
            policy: self.policy,
            source: self.source,
            cache: CoalescingCache::with_config(&self.cache),
        }
    }
}
