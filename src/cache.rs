//! Short-lived sensor read cache.
//!
//! Bounds the rate of sensor polling against the device no matter how often
//! the host reads, while bounding staleness to one cache window:
//!
//! - a live entry answers with zero transport calls
//! - a miss issues exactly one transport call, and every reader that misses
//!   while that call is outstanding waits for the same result (single-flight)
//! - failures reach every waiter and never populate an entry
//!
//! Expiry is measured with `tokio::time::Instant`, so tests can drive it with
//! paused time.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{LinkError, LinkResult};
use crate::failure::{FailureOrigin, FailureReporter};
use crate::transport::Transport;

const LOG_TARGET: &str = "robolink::cache";

/// A decoded sensor payload (JSON scalar or array).
pub type SensorValue = serde_json::Value;

type FetchOutcome = Option<LinkResult<SensorValue>>;

/// Last observed reading for one query key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: SensorValue,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counters over the cache's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a live entry.
    pub hits: u64,
    /// Transport calls issued for misses.
    pub fetches: u64,
    /// Reads that joined a fetch another reader started.
    pub joined: u64,
}

struct Shared<K> {
    entries: DashMap<K, CacheEntry>,
    in_flight: DashMap<K, watch::Receiver<FetchOutcome>>,
    transport: Arc<dyn Transport>,
    window: Duration,
    failures: FailureReporter,
    hits: AtomicU64,
    fetches: AtomicU64,
    joined: AtomicU64,
}

/// Per-key read cache with a fixed validity window. Cheap to clone.
///
/// Fetches run on the runtime behind `runtime`, so `read` may be awaited from
/// any thread, including ones outside that runtime.
pub struct ReadCache<K> {
    shared: Arc<Shared<K>>,
    runtime: Handle,
}

impl<K> Clone for ReadCache<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            runtime: self.runtime.clone(),
        }
    }
}

impl<K> ReadCache<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    pub fn new(
        runtime: Handle,
        transport: Arc<dyn Transport>,
        window: Duration,
        failures: FailureReporter,
    ) -> Self {
        Self {
            runtime,
            shared: Arc::new(Shared {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                transport,
                window,
                failures,
                hits: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                joined: AtomicU64::new(0),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Read `key`, fetching `path(key)` only when no live entry exists.
    ///
    /// The fetch runs on its own task, so dropping this future does not abort
    /// a transport call other readers may be waiting on.
    pub async fn read(&self, key: &K, path: impl FnOnce(&K) -> String) -> LinkResult<SensorValue> {
        if let Some(value) = self.peek(key) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: LOG_TARGET, "{}: hit", key);
            return Ok(value);
        }

        let mut rx = match self.shared.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                self.shared.joined.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: LOG_TARGET, "{}: joining in-flight fetch", key);
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                // A fetch may have landed between the lookup above and here.
                if let Some(value) = self.peek(key) {
                    self.shared.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx.clone());
                log::debug!(target: LOG_TARGET, "{}: miss, fetching", key);
                self.runtime
                    .spawn(fetch(Arc::clone(&self.shared), key.clone(), path(key), tx));
                rx
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(LinkError::Io(format!(
                "fetch for {} ended without a result",
                key
            )))
        })
    }

    /// The live cached value for `key`, without touching the transport.
    pub fn peek(&self, key: &K) -> Option<SensorValue> {
        let now = Instant::now();
        let entry = self.shared.entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.shared
            .entries
            .remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.shared.entries.len();
        self.shared.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.shared.entries.len())
    }

    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            fetches: self.shared.fetches.load(Ordering::Relaxed),
            joined: self.shared.joined.load(Ordering::Relaxed),
        }
    }
}

async fn fetch<K>(shared: Arc<Shared<K>>, key: K, path: String, tx: watch::Sender<FetchOutcome>)
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    shared.fetches.fetch_add(1, Ordering::Relaxed);

    let result = match shared.transport.perform(&path).await {
        Ok(payload) => parse_payload(&payload),
        Err(err) => Err(err),
    };

    match &result {
        Ok(value) => {
            let expires_at = Instant::now() + shared.window;
            shared.entries.insert(
                key.clone(),
                CacheEntry {
                    value: value.clone(),
                    expires_at,
                },
            );
            log::debug!(target: LOG_TARGET, "{}: cached {}", key, value);
        }
        Err(err) => {
            shared
                .failures
                .report(FailureOrigin::Read, key.to_string(), err.clone());
        }
    }

    // Entry first, then release the in-flight marker, then wake waiters:
    // a reader arriving in between finds either the marker or the entry.
    shared.in_flight.remove(&key);
    tx.send_replace(Some(result));
}

/// Decode a sensor payload as JSON.
pub fn parse_payload(payload: &str) -> LinkResult<SensorValue> {
    serde_json::from_str(payload.trim()).map_err(|e| LinkError::parse(payload, e.to_string()))
}
