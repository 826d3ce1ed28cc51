//! Failure reporting channel.
//!
//! The dispatcher absorbs transport failures and the cache returns them to
//! one caller, but a host still wants to tell its user once that the server
//! is unreachable or the robot is unplugged. Every failure is logged here and
//! published on a broadcast channel that the presentation layer can drain.

use tokio::sync::broadcast;

use crate::error::LinkError;

/// Capacity of the failure channel; lagging subscribers skip old failures.
const CHANNEL_CAPACITY: usize = 64;

const LOG_TARGET: &str = "robolink::failure";

/// Where a reported failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// A coalesced output send.
    Output,
    /// A sensor read.
    Read,
    /// An uncoalesced one-shot command.
    OneShot,
}

/// A failure as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub origin: FailureOrigin,
    /// Key or path the failure belongs to, for display.
    pub subject: String,
    pub error: LinkError,
}

/// Cloneable handle publishing failures to any number of subscribers.
#[derive(Clone)]
pub struct FailureReporter {
    tx: broadcast::Sender<Failure>,
}

impl Default for FailureReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Failure> {
        self.tx.subscribe()
    }

    pub fn report(&self, origin: FailureOrigin, subject: impl Into<String>, error: LinkError) {
        let subject = subject.into();
        log::warn!(
            target: LOG_TARGET,
            "{:?} failure for {}: {}",
            origin,
            subject,
            error
        );
        // No subscribers is the common case for headless hosts.
        let _ = self.tx.send(Failure {
            origin,
            subject,
            error,
        });
    }
}
