//! muxcdn - static content delivery with a coalescing TTL file cache
//!
//! The core of this crate is [`CoalescingCache`]: a per-key memo of an
//! expensive async load that runs at most one load per key at a time and
//! expires results after a fixed TTL. [`StaticFiles`] is its main consumer,
//! serving files from a root directory behind whitelist/blacklist globs.
//!
//! # Cache Example
//!
//! ```rust
//! use std::time::Duration;
//! use muxcdn::CoalescingCache;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: CoalescingCache<String, String> = CoalescingCache::new(Duration::from_secs(60));
//!
//! let value = cache
//!     .get("greeting", || async { Ok::<_, String>("hello".to_string()) })
//!     .await;
//! assert_eq!(value, Ok("hello".to_string()));
//!
//! // Within the TTL the loader is not called again.
//! let value = cache
//!     .get("greeting", || async { Ok::<_, String>("ignored".to_string()) })
//!     .await;
//! assert_eq!(value, Ok("hello".to_string()));
//! # }
//! ```
//!
//! # File Serving Example
//!
//! ```rust,no_run
//! use muxcdn::{Config, StaticFiles};
//!
//! # #[tokio::main]
//! # async fn main() -> muxcdn::Result<()> {
//! let config = Config::load(None)?;
//! let files = StaticFiles::from_config(&config)?;
//!
//! match files.fetch("/index.html").await {
//!     Ok(file) => println!("{} ({} bytes)", file.content_type, file.body.len()),
//!     Err(e) if e.is_not_found() => println!("404 page not found"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod files;
pub mod telemetry;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheError, CoalescingCache};
pub use config::Config;
pub use error::{MuxcdnError, Result};
pub use files::{AccessPolicy, ContentSource, DiskSource, ServedFile, StaticFiles};
