//! Command-coalescing output dispatcher.
//!
//! The dispatcher sits between a host that submits actuator values at frame
//! rate and a control server that can absorb only a handful of requests per
//! second. For every target key it keeps at most one transport call
//! outstanding and at most one waiting value, the newest.
//!
//! # Architecture
//!
//! ```text
//! submit(key, value)
//!       │
//!       ▼
//! DispatchSlot::submit  (under the key's map entry)
//!       │
//!       ├─► idle      → spawn driver task, send value
//!       ├─► busy, ≠   → replace pending value
//!       └─► busy, =   → drop pending value
//!
//! driver task (one per busy key)
//!       │
//!       ├─► Transport::perform(path)      (failure is logged and absorbed)
//!       │
//!       └─► DispatchSlot::complete
//!               ├─► pending promoted → send it, loop
//!               └─► nothing pending  → key idle, task ends
//! ```
//!
//! Intermediate values superseded while waiting are never sent. The last
//! value submitted before the key goes quiet is always sent.

mod slot;

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::failure::{FailureOrigin, FailureReporter};
use crate::transport::Transport;

use slot::{DispatchSlot, SlotAction};

const LOG_TARGET: &str = "robolink::dispatch";

/// Builds the request path for one key/value pair.
pub type RequestBuilder<K, V> = Arc<dyn Fn(&K, &V) -> String + Send + Sync>;

/// Outcome of a [`OutputDispatcher::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The key was idle; a transport call started with this value.
    Sent,
    /// A different value is in flight; this one waits.
    Queued,
    /// As `Queued`, and an older waiting value was discarded unsent.
    Superseded,
    /// The value equals the one in flight; nothing new will be sent.
    Unchanged,
}

/// Counters over the dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: u64,
    pub sent: u64,
    pub superseded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    sent: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
}

struct Shared<K, V> {
    slots: DashMap<K, DispatchSlot<V>>,
    transport: Arc<dyn Transport>,
    build_request: RequestBuilder<K, V>,
    failures: FailureReporter,
    /// Woken whenever a key returns to idle.
    idle: Notify,
    counters: Counters,
}

/// Per-key coalescing dispatcher. Cheap to clone; clones share state.
pub struct OutputDispatcher<K, V> {
    shared: Arc<Shared<K, V>>,
    runtime: Handle,
}

impl<K, V> Clone for OutputDispatcher<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            runtime: self.runtime.clone(),
        }
    }
}

impl<K, V> OutputDispatcher<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + PartialEq + Display + Send + Sync + 'static,
{
    /// Create a dispatcher whose transport calls run on `runtime`.
    pub fn new(
        runtime: Handle,
        transport: Arc<dyn Transport>,
        build_request: RequestBuilder<K, V>,
        failures: FailureReporter,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: DashMap::new(),
                transport,
                build_request,
                failures,
                idle: Notify::new(),
                counters: Counters::default(),
            }),
            runtime,
        }
    }

    /// Request that `key`'s actuator converge to `value`.
    ///
    /// Never blocks on the transport; the call is started on the runtime.
    pub fn submit(&self, key: K, value: V) -> Submission {
        let counters = &self.shared.counters;
        counters.submitted.fetch_add(1, Ordering::Relaxed);

        let action = self
            .shared
            .slots
            .entry(key.clone())
            .or_default()
            .submit(value);

        match action {
            SlotAction::Send(value) => {
                log::trace!(target: LOG_TARGET, "{}: sending {}", key, value);
                self.runtime
                    .spawn(drive(Arc::clone(&self.shared), key, value));
                Submission::Sent
            }
            SlotAction::Queued { superseded: false } => {
                log::trace!(target: LOG_TARGET, "{}: queued behind in-flight send", key);
                Submission::Queued
            }
            SlotAction::Queued { superseded: true } => {
                counters.superseded.fetch_add(1, Ordering::Relaxed);
                log::trace!(target: LOG_TARGET, "{}: replaced pending value", key);
                Submission::Superseded
            }
            SlotAction::Collapsed { dropped_pending } => {
                if dropped_pending {
                    counters.superseded.fetch_add(1, Ordering::Relaxed);
                }
                log::trace!(
                    target: LOG_TARGET,
                    "{}: matches in-flight value (dropped pending: {})",
                    key,
                    dropped_pending
                );
                Submission::Unchanged
            }
        }
    }

    /// Submit the safe value for every known key that has one.
    ///
    /// Safe values go through the same coalescing rules as any submission.
    /// Returns the number of keys a safe value was submitted for.
    pub fn halt_all(&self, safe_value: impl Fn(&K) -> Option<V>) -> usize {
        let keys = self.known_keys();
        let mut halted = 0;
        for key in keys {
            if let Some(value) = safe_value(&key) {
                self.submit(key, value);
                halted += 1;
            }
        }
        log::info!(target: LOG_TARGET, "Halt submitted safe values for {} actuators", halted);
        halted
    }

    /// Every key that has been submitted to so far.
    pub fn known_keys(&self) -> Vec<K> {
        self.shared
            .slots
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// True when no transport call is outstanding for `key`.
    pub fn is_idle(&self, key: &K) -> bool {
        self.shared
            .slots
            .get(key)
            .is_none_or(|slot| slot.is_idle())
    }

    /// Number of keys with a transport call outstanding.
    pub fn in_flight(&self) -> usize {
        self.shared
            .slots
            .iter()
            .filter(|slot| !slot.is_idle())
            .count()
    }

    pub fn stats(&self) -> DispatchStats {
        let counters = &self.shared.counters;
        DispatchStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            sent: counters.sent.load(Ordering::Relaxed),
            superseded: counters.superseded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Resolve once every key is idle.
    pub async fn idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not lost.
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Send `value` for `key`, then keep sending promoted values until the slot
/// has nothing pending.
async fn drive<K, V>(shared: Arc<Shared<K, V>>, key: K, mut value: V)
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + PartialEq + Display + Send + Sync + 'static,
{
    loop {
        let path = (shared.build_request)(&key, &value);
        shared.counters.sent.fetch_add(1, Ordering::Relaxed);

        match shared.transport.perform(&path).await {
            Ok(_) => log::trace!(target: LOG_TARGET, "{}: delivered {}", key, value),
            Err(err) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                shared
                    .failures
                    .report(FailureOrigin::Output, key.to_string(), err);
            }
        }

        let next = shared
            .slots
            .get_mut(&key)
            .and_then(|mut slot| slot.complete());

        match next {
            Some(promoted) => {
                log::trace!(target: LOG_TARGET, "{}: promoting pending {}", key, promoted);
                value = promoted;
            }
            None => break,
        }
    }

    log::trace!(target: LOG_TARGET, "{}: idle", key);
    shared.idle.notify_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use crate::transport::test_helpers::ScriptedTransport;
    use std::time::Duration;

    fn dispatcher(transport: Arc<ScriptedTransport>) -> OutputDispatcher<String, i32> {
        OutputDispatcher::new(
            Handle::current(),
            transport,
            Arc::new(|key: &String, value: &i32| format!("/{}/{}", key, value)),
            FailureReporter::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_submit_starts_a_call_without_waiting() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        assert_eq!(dispatcher.submit("motor".into(), 50), Submission::Sent);
        assert!(!dispatcher.is_idle(&"motor".to_string()));

        tokio::task::yield_now().await;
        assert_eq!(transport.calls(), vec!["/motor/50".to_string()]);

        dispatcher.idle().await;
        assert!(dispatcher.is_idle(&"motor".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_sends_first_and_last_value_only() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        assert_eq!(dispatcher.submit("motor".into(), 1), Submission::Sent);
        assert_eq!(dispatcher.submit("motor".into(), 2), Submission::Queued);
        assert_eq!(dispatcher.submit("motor".into(), 3), Submission::Superseded);

        dispatcher.idle().await;

        assert_eq!(
            transport.calls(),
            vec!["/motor/1".to_string(), "/motor/3".to_string()]
        );
        assert_eq!(transport.peak_in_flight(), 1);
        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                submitted: 3,
                sent: 2,
                superseded: 1,
                failed: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_value_collapses_into_one_call() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        dispatcher.submit("led".into(), 100);
        assert_eq!(dispatcher.submit("led".into(), 100), Submission::Unchanged);

        dispatcher.idle().await;
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_in_flight_value_cancels_pending() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        dispatcher.submit("led".into(), 1);
        dispatcher.submit("led".into(), 2);
        assert_eq!(dispatcher.submit("led".into(), 1), Submission::Unchanged);

        dispatcher.idle().await;
        assert_eq!(transport.calls(), vec!["/led/1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_end_the_send_and_pending_still_goes_out() {
        let transport = Arc::new(ScriptedTransport::new(Duration::from_millis(20), |_| {
            Err(LinkError::connectivity("http://localhost:22179", "refused"))
        }));
        let dispatcher = dispatcher(transport.clone());

        dispatcher.submit("motor".into(), 1);
        dispatcher.submit("motor".into(), 2);
        dispatcher.idle().await;

        assert_eq!(transport.call_count(), 2);
        assert_eq!(dispatcher.stats().failed, 2);

        // The key is usable again after failures.
        assert_eq!(dispatcher.submit("motor".into(), 3), Submission::Sent);
        dispatcher.idle().await;
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_published_to_subscribers() {
        let transport = Arc::new(ScriptedTransport::new(Duration::from_millis(5), |_| {
            Err(LinkError::not_connected("Finch not connected"))
        }));
        let failures = FailureReporter::new();
        let mut rx = failures.subscribe();
        let dispatcher: OutputDispatcher<String, i32> = OutputDispatcher::new(
            Handle::current(),
            transport,
            Arc::new(|key: &String, value: &i32| format!("/{}/{}", key, value)),
            failures,
        );

        dispatcher.submit("motor".into(), 1);
        let failure = rx.recv().await.unwrap();

        assert_eq!(failure.origin, FailureOrigin::Output);
        assert_eq!(failure.subject, "motor");
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_are_served_concurrently() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        assert_eq!(dispatcher.submit("left".into(), 1), Submission::Sent);
        assert_eq!(dispatcher.submit("right".into(), 1), Submission::Sent);
        assert_eq!(dispatcher.in_flight(), 2);

        dispatcher.idle().await;
        assert_eq!(transport.peak_in_flight(), 2);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn halt_all_submits_safe_values_for_known_keys() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport.clone());

        dispatcher.submit("motor".into(), 80);
        dispatcher.submit("servo".into(), 90);
        dispatcher.idle().await;

        let halted = dispatcher.halt_all(|key| (key == "motor").then_some(0));
        dispatcher.idle().await;

        assert_eq!(halted, 1);
        assert_eq!(transport.calls().last(), Some(&"/motor/0".to_string()));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_resolves_immediately_without_activity() {
        let transport = Arc::new(ScriptedTransport::replying("ok"));
        let dispatcher = dispatcher(transport);
        dispatcher.idle().await;
        assert_eq!(dispatcher.stats(), DispatchStats::default());
    }
}
