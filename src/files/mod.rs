//! Static file delivery.
//!
//! [`StaticFiles`] maps request paths onto a root directory, applies the
//! [`AccessPolicy`], and loads file bytes through a [`CoalescingCache`]
//! keyed by the full filesystem path. Concurrent requests for the same file
//! share one read, and a file's bytes (or its read error) are reused until
//! the cache TTL runs out.
//!
//! Denied and missing files are both reported as "not found"
//! ([`MuxcdnError::is_not_found`]) so clients cannot probe the policy.

mod access;
mod builder;
mod content_type;
mod source;

pub use access::AccessPolicy;
pub use builder::StaticFilesBuilder;
pub use content_type::{DEFAULT_CONTENT_TYPE, content_type};
pub use source::{ContentSource, DiskSource};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{CacheError, CoalescingCache};
use crate::config::Config;
use crate::telemetry;
use crate::{MuxcdnError, Result};

/// A file ready to be written to a response.
#[derive(Debug, Clone)]
pub struct ServedFile {
    /// Filesystem path the bytes were read from.
    pub path: PathBuf,
    /// `Content-Type` resolved from the extension.
    pub content_type: &'static str,
    pub body: Bytes,
}

/// Serves files below a root directory through a coalescing TTL cache.
pub struct StaticFiles {
    root: PathBuf,
    default_file: Option<String>,
    policy: AccessPolicy,
    source: Arc<dyn ContentSource>,
    cache: CoalescingCache<Bytes, Arc<io::Error>>,
}

impl StaticFiles {
    /// Create a new builder rooted at `root`.
    pub fn builder(root: impl Into<PathBuf>) -> StaticFilesBuilder {
        StaticFilesBuilder::new(root)
    }

    /// Build from a loaded [`Config`], compiling its glob patterns.
    pub fn from_config(config: &Config) -> Result<Self> {
        let files = &config.files;
        let policy = AccessPolicy::from_patterns(&files.whitelist, &files.blacklist)?;
        let mut builder = Self::builder(&files.root)
            .policy(policy)
            .cache((&config.cache).into());
        if let Some(default_file) = &files.default_file {
            builder = builder.default_file(default_file.as_str());
        }
        Ok(builder.build())
    }

    /// Root directory requests are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying file cache.
    pub fn cache(&self) -> &CoalescingCache<Bytes, Arc<io::Error>> {
        &self.cache
    }

    /// Resolve `request_path` and return the file's bytes.
    ///
    /// `""` and `"/"` serve the default file, which is not subject to the
    /// access policy. Every other path is joined onto the root and must be
    /// allowed by the policy.
    ///
    /// # Errors
    ///
    /// - [`MuxcdnError::Denied`] if the policy rejects the path
    /// - [`MuxcdnError::NotFound`] if the source could not read it, or no
    ///   default file is configured
    /// - [`MuxcdnError::Load`] if the read ended abnormally
    pub async fn fetch(&self, request_path: &str) -> Result<ServedFile> {
        let result = self.resolve_and_load(request_path).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(MuxcdnError::Denied(_)) => "denied",
            Err(MuxcdnError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!(telemetry::FILE_REQUESTS_TOTAL, "status" => status).increment(1);
        result
    }

    async fn resolve_and_load(&self, request_path: &str) -> Result<ServedFile> {
        let relative = request_path.trim_start_matches('/');
        let path = if relative.is_empty() {
            let Some(default_file) = &self.default_file else {
                return Err(MuxcdnError::NotFound {
                    path: request_path.to_string(),
                    source: Arc::new(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no default file configured",
                    )),
                });
            };
            self.root.join(default_file)
        } else {
            let path = self.root.join(relative);
            if !self.policy.is_allowed(&path) {
                warn!(path = %path.display(), "request denied by access policy");
                return Err(MuxcdnError::Denied(request_path.to_string()));
            }
            path
        };

        let body = self.load(&path).await?;
        debug!(path = %path.display(), bytes = body.len(), "serving file");
        Ok(ServedFile {
            content_type: content_type(&path),
            path,
            body,
        })
    }

    async fn load(&self, path: &Path) -> Result<Bytes> {
        let key = path.to_string_lossy().into_owned();
        let source = Arc::clone(&self.source);
        let owned = path.to_path_buf();
        let loaded = self
            .cache
            .get(&key, move || async move {
                source.read(&owned).await.map_err(Arc::new)
            })
            .await;

        loaded.map_err(|err| match err {
            CacheError::Load(source) => MuxcdnError::NotFound { path: key, source },
            CacheError::LoadAborted => MuxcdnError::Load(key),
        })
    }
}

impl std::fmt::Debug for StaticFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticFiles")
            .field("root", &self.root)
            .field("default_file", &self.default_file)
            .field("policy", &self.policy)
            .field("source", &self.source.name())
            .field("cache", &self.cache)
            .finish()
    }
}
