//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use muxcdn::{AccessPolicy, CoalescingCache, StaticFiles, telemetry};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_with_label(snapshot, name, None)
}

/// Sum counter values for `name`, optionally restricted to one `status` label.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, status: Option<&str>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            status.is_none_or(|status| {
                key.key()
                    .labels()
                    .any(|l| l.key() == "status" && l.value() == status)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Run `fut` on a current-thread runtime with a local recorder installed.
///
/// Loads run on spawned tasks; a single-threaded runtime keeps them on the
/// thread that owns the local recorder.
fn record<F: Future>(fut: F) -> (F::Output, SnapshotVec) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let output = metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    });
    (output, snapshotter.snapshot().into_vec())
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn miss_then_hit_records_cache_metrics() {
    let (_, snapshot) = record(async {
        let cache: CoalescingCache<u32, String> = CoalescingCache::new(Duration::from_secs(60));
        cache.get("k", || async { Ok::<_, String>(1) }).await.unwrap();
        cache.get("k", || async { Ok::<_, String>(2) }).await.unwrap();
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_LOADS_TOTAL, Some("ok")),
        1
    );
}

#[test]
fn joining_a_pending_load_records_coalesced() {
    let (_, snapshot) = record(async {
        let cache: CoalescingCache<u32, String> = CoalescingCache::new(Duration::from_secs(60));
        let slow = || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, String>(1)
        };
        let (a, b) = tokio::join!(cache.get("k", slow), cache.get("k", slow));
        assert_eq!((a, b), (Ok(1), Ok(1)));
    });

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_COALESCED_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_LOADS_TOTAL), 1);
}

#[test]
fn loader_error_records_error_status() {
    let (_, snapshot) = record(async {
        let cache: CoalescingCache<u32, String> = CoalescingCache::new(Duration::from_secs(60));
        let _ = cache
            .get("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
    });

    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_LOADS_TOTAL, Some("error")),
        1
    );
}

#[test]
fn file_requests_are_counted_by_status() {
    let (_, snapshot) = record(async {
        let files = StaticFiles::builder("/srv/site")
            .policy(AccessPolicy::from_patterns(&["/srv/site/*"], &[]).unwrap())
            .build();
        let _ = files.fetch("/private/secret.txt").await;
        let _ = files.fetch("/definitely-not-here.txt").await;
    });

    assert_eq!(
        counter_with_label(&snapshot, telemetry::FILE_REQUESTS_TOTAL, Some("denied")),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FILE_REQUESTS_TOTAL, Some("not_found")),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let cache: CoalescingCache<u32, String> = CoalescingCache::new(Duration::from_secs(60));
    assert_eq!(cache.get("k", || async { Ok::<_, String>(3) }).await, Ok(3));
}
