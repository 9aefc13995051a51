//! Telemetry metric name constants.
//!
//! Centralised metric names for muxcdn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muxcdn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `status`: outcome of a load or request (see each metric)

/// Cache lookups answered by a settled, fresh entry.
pub const CACHE_HITS_TOTAL: &str = "muxcdn_cache_hits_total";

/// Cache lookups that found no entry or a stale one and started a load.
pub const CACHE_MISSES_TOTAL: &str = "muxcdn_cache_misses_total";

/// Cache lookups that joined a load already in flight.
pub const CACHE_COALESCED_TOTAL: &str = "muxcdn_cache_coalesced_total";

/// Completed load episodes, counted once per episode.
///
/// Labels: `status` ("ok" | "error" | "aborted").
pub const CACHE_LOADS_TOTAL: &str = "muxcdn_cache_loads_total";

/// File requests handled by [`StaticFiles`](crate::files::StaticFiles).
///
/// Labels: `status` ("ok" | "denied" | "not_found" | "error").
pub const FILE_REQUESTS_TOTAL: &str = "muxcdn_file_requests_total";
