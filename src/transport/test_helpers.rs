//! Scripted in-memory transport for unit tests.
//!
//! Records every request path, tracks the peak number of concurrently
//! outstanding calls, and simulates latency with `tokio::time::sleep` so
//! tests running with paused time stay deterministic.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Transport, TransportFuture};
use crate::error::LinkResult;

type Responder = Box<dyn Fn(&str) -> LinkResult<String> + Send + Sync>;

pub(crate) struct ScriptedTransport {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
    respond: Responder,
}

impl ScriptedTransport {
    pub(crate) fn new(
        latency: Duration,
        respond: impl Fn(&str) -> LinkResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            latency,
            respond: Box::new(respond),
        }
    }

    /// Always reply with `payload` after 10ms.
    pub(crate) fn replying(payload: &'static str) -> Self {
        Self::new(Duration::from_millis(10), move |_| Ok(payload.to_string()))
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn perform<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(path.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.latency).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.respond)(path)
        })
    }
}
