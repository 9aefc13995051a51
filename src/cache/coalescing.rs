//! Coalescing TTL cache.
//!
//! [`CoalescingCache::get`] returns the current value for a key, running the
//! caller's loader only when the key is absent or its result has expired.
//! Concurrent lookups that arrive while a load is in flight wait for that
//! load instead of starting their own, so each miss costs exactly one loader
//! execution no matter how many callers observed it.
//!
//! # Load episodes
//!
//! Each key maps to the most recent *episode*: a one-shot `watch` channel
//! holding `None` while the load runs and `Some(settled)` afterwards. An
//! episode is installed under the table lock the moment a miss is detected
//! and the lock is released before the loader runs. The loader runs on its
//! own task, so a caller that gives up waiting (its future is dropped) never
//! cancels the load for everyone else.
//!
//! Freshness is judged from the time the load *completed*. An episode that
//! is still pending counts as fresh however long it takes; a slow load is
//! never pre-empted by a second one for the same key.
//!
//! If the loader panics, or its task is torn down before finishing, a drop
//! guard settles the episode with [`CacheError::LoadAborted`]. Waiters are
//! released with that error and the episode is immediately stale, so the
//! next lookup retries.
//!
//! # Memory
//!
//! Nothing is ever evicted. Expired results stay in the table until the same
//! key is requested again, so memory is bounded by the number of distinct
//! keys ever requested, not by age or payload volume. Callers with an
//! unbounded key space must bound it themselves.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::CacheConfig;
use crate::telemetry;

/// Error returned by [`CoalescingCache::get`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError<E> {
    /// The loader returned this error. Every caller of the same episode
    /// receives a clone of it.
    #[error("{0}")]
    Load(E),

    /// The loader did not finish normally (it panicked or its task was
    /// cancelled by runtime shutdown).
    #[error("load failed unexpectedly")]
    LoadAborted,
}

/// Result of a finished episode.
#[derive(Clone)]
struct Settled<V, E> {
    outcome: Result<V, CacheError<E>>,
    /// `None` for aborted episodes, which are never fresh.
    loaded_at: Option<Instant>,
}

type Episode<V, E> = watch::Receiver<Option<Settled<V, E>>>;

/// In-memory, single-flight cache with a fixed time-to-live.
///
/// Values and loader errors must be cheap to clone since every waiter gets
/// its own copy (`bytes::Bytes`, `Arc<_>`). See the [module docs](self) for
/// the episode model.
pub struct CoalescingCache<V, E> {
    ttl: Duration,
    table: Mutex<HashMap<String, Episode<V, E>>>,
}

impl<V, E> CoalescingCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty cache whose results stay fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Create an empty cache from a [`CacheConfig`].
    pub fn with_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl)
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of keys tracked, including expired ones.
    pub fn len(&self) -> usize {
        self.lock_table().len()
    }

    /// Whether no key has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the value for `key`, loading it with `loader` on a miss.
    ///
    /// On a miss `loader` is spawned onto the current Tokio runtime and
    /// every caller, including this one, waits for it to settle. On a hit
    /// `loader` is dropped without being called. Errors from the loader are
    /// returned as [`CacheError::Load`] and cached for the TTL like values.
    ///
    /// Dropping the returned future only stops this caller from waiting;
    /// the load itself keeps running.
    ///
    /// # Panics
    ///
    /// Requires a Tokio runtime context when the lookup is a miss.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut episode = match self.lookup(key) {
            Lookup::Hit(episode) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                episode
            }
            Lookup::Pending(episode) => {
                metrics::counter!(telemetry::CACHE_COALESCED_TOTAL).increment(1);
                episode
            }
            Lookup::Miss(settle, episode) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key, "cache miss, starting load");
                tokio::spawn(run_episode(settle, loader));
                episode
            }
        };

        let settled = episode
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|settled| settled.as_ref().map(|s| s.outcome.clone()));
        // The guard always publishes before the sender goes away, so a
        // closed channel without a value only happens if that invariant breaks.
        settled.unwrap_or(Err(CacheError::LoadAborted))
    }

    /// Find the live episode for `key`, or install a new pending one.
    fn lookup(&self, key: &str) -> Lookup<V, E> {
        let mut table = self.lock_table();
        if let Some(episode) = table.get(key) {
            // `None` while the load is pending, otherwise whether it is fresh.
            let fresh = episode.borrow().as_ref().map(|settled| self.is_fresh(settled));
            match fresh {
                None => return Lookup::Pending(episode.clone()),
                Some(true) => return Lookup::Hit(episode.clone()),
                Some(false) => {}
            }
        }

        let (tx, rx) = watch::channel(None);
        table.insert(key.to_owned(), rx.clone());
        let settle = Settle {
            key: key.to_owned(),
            started: Instant::now(),
            tx: Some(tx),
        };
        Lookup::Miss(settle, rx)
    }

    fn is_fresh(&self, settled: &Settled<V, E>) -> bool {
        settled
            .loaded_at
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    // Only table bookkeeping runs under this lock, so a poisoned lock still
    // guards a consistent map.
    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Episode<V, E>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V, E> fmt::Debug for CoalescingCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .table
            .lock()
            .map(|table| table.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        f.debug_struct("CoalescingCache")
            .field("ttl", &self.ttl)
            .field("entries", &entries)
            .finish()
    }
}

enum Lookup<V, E> {
    /// Settled and fresh.
    Hit(Episode<V, E>),
    /// Another caller's load is in flight.
    Pending(Episode<V, E>),
    /// This caller owns the new episode and must start the load.
    Miss(Settle<V, E>, Episode<V, E>),
}

/// Write side of an episode.
///
/// Publishing the result and its timestamp is a single `send_replace`, so a
/// waiter that sees the episode settled sees all of it. If the guard is
/// dropped before [`finish`](Self::finish), it settles the episode as aborted.
struct Settle<V, E> {
    key: String,
    started: Instant,
    tx: Option<watch::Sender<Option<Settled<V, E>>>>,
}

impl<V, E> Settle<V, E> {
    fn finish(mut self, outcome: Result<V, E>) {
        let status = if outcome.is_ok() { "ok" } else { "error" };
        debug!(
            key = %self.key,
            status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "load settled"
        );
        metrics::counter!(telemetry::CACHE_LOADS_TOTAL, "status" => status).increment(1);

        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(Settled {
                outcome: outcome.map_err(CacheError::Load),
                loaded_at: Some(Instant::now()),
            }));
        }
    }
}

impl<V, E> Drop for Settle<V, E> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!(key = %self.key, "load ended without a result");
            metrics::counter!(telemetry::CACHE_LOADS_TOTAL, "status" => "aborted").increment(1);
            tx.send_replace(Some(Settled {
                outcome: Err(CacheError::LoadAborted),
                loaded_at: None,
            }));
        }
    }
}

async fn run_episode<V, E, F, Fut>(settle: Settle<V, E>, loader: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let outcome = loader().await;
    settle.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time;

    use super::*;

    type TestCache = CoalescingCache<usize, String>;

    fn counting_loader(
        calls: Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::future::Ready<Result<usize, String>> + Send + 'static {
        move || -> std::future::Ready<Result<usize, String>> {
            std::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst)))
        }
    }

    async fn exploding_loader() -> Result<usize, String> {
        panic!("loader blew up")
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh() {
        let cache = TestCache::new(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let res = tokio::join!(
            cache.get("k", counting_loader(Arc::clone(&calls))),
            cache.get("k", counting_loader(Arc::clone(&calls))),
            cache.get("k", counting_loader(Arc::clone(&calls))),
        );
        assert_eq!((res.0, res.1, res.2), (Ok(0), Ok(0), Ok(0)));

        time::advance(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k", counting_loader(Arc::clone(&calls))).await, Ok(0));

        time::advance(Duration::from_millis(10)).await;

        let res = tokio::join!(
            cache.get("k", counting_loader(Arc::clone(&calls))),
            cache.get("k", counting_loader(Arc::clone(&calls))),
        );
        assert_eq!((res.0, res.1), (Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_entry_is_replaced_not_duplicated() {
        let cache = TestCache::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache.get("k", counting_loader(Arc::clone(&calls))).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn errors_are_cached_within_ttl() {
        let cache = TestCache::new(Duration::from_secs(60));

        let first = cache
            .get("k", || async { Err::<usize, String>("boom".to_string()) })
            .await;
        assert_eq!(first, Err(CacheError::Load("boom".to_string())));

        let second = cache.get("k", || async { Ok::<usize, String>(7) }).await;
        assert_eq!(second, Err(CacheError::Load("boom".to_string())));
    }

    #[tokio::test]
    async fn aborted_episode_is_stale() {
        let cache = TestCache::new(Duration::from_secs(60));

        let first = cache.get("k", exploding_loader).await;
        assert_eq!(first, Err(CacheError::LoadAborted));

        let second = cache.get("k", || async { Ok::<usize, String>(1) }).await;
        assert_eq!(second, Ok(1));
    }

    #[test]
    fn debug_reports_ttl_and_size() {
        let cache = TestCache::new(Duration::from_secs(1));
        let rendered = format!("{cache:?}");
        assert!(rendered.contains("ttl: 1s"));
        assert!(rendered.contains("entries: 0"));
    }
}
