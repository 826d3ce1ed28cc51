//! Transport boundary to the device control server.
//!
//! A transport performs exactly one request for one fully-formed command or
//! query path and yields the raw text payload. It never retries; failures are
//! handed back to the dispatcher or cache, which decide what they mean for
//! flow control.

mod http;
#[cfg(test)]
pub(crate) mod test_helpers;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{LinkError, LinkResult};

pub use http::HttpTransport;

const LOG_TARGET: &str = "robolink::transport";

/// Boxed future returned by [`Transport::perform`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = LinkResult<String>> + Send + 'a>>;

/// One request/response exchange with the control server.
pub trait Transport: Send + Sync + 'static {
    /// Perform a GET for `path` (already percent-encoded, starting with `/`)
    /// relative to the server's base address.
    fn perform<'a>(&'a self, path: &'a str) -> TransportFuture<'a>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn perform<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        (**self).perform(path)
    }
}

/// Turn a successful payload equal to the "not connected" sentinel into a
/// domain error, whatever HTTP status carried it.
pub fn reject_disconnected(payload: String, sentinel: &str) -> LinkResult<String> {
    if payload.trim() == sentinel {
        Err(LinkError::not_connected(sentinel))
    } else {
        Ok(payload)
    }
}

/// Transport decorator applying [`reject_disconnected`] to every payload.
pub struct RejectDisconnected<T> {
    inner: T,
    sentinel: String,
}

impl<T: Transport> RejectDisconnected<T> {
    pub fn new(inner: T, sentinel: impl Into<String>) -> Self {
        Self {
            inner,
            sentinel: sentinel.into(),
        }
    }
}

impl<T: Transport> Transport for RejectDisconnected<T> {
    fn perform<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            let payload = self.inner.perform(path).await?;
            reject_disconnected(payload, &self.sentinel).inspect_err(|_| {
                log::debug!(
                    target: LOG_TARGET,
                    "Server reported no robot connected for {}",
                    path
                );
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::ScriptedTransport;
    use super::*;

    #[test]
    fn sentinel_payload_is_a_domain_error() {
        let result = reject_disconnected("Finch not connected".to_string(), "Finch not connected");
        assert_eq!(result, Err(LinkError::not_connected("Finch not connected")));
    }

    #[test]
    fn sentinel_match_ignores_surrounding_whitespace() {
        let result = reject_disconnected("Finch not connected\n".to_string(), "Finch not connected");
        assert!(matches!(result, Err(LinkError::DeviceNotConnected { .. })));
    }

    #[test]
    fn other_payloads_pass_through() {
        let result = reject_disconnected("42".to_string(), "Finch not connected");
        assert_eq!(result, Ok("42".to_string()));
    }

    #[tokio::test]
    async fn decorator_rejects_sentinel_from_inner_transport() {
        let inner = Arc::new(ScriptedTransport::replying("Hummingbird not connected"));
        let guarded = RejectDisconnected::new(inner.clone(), "Hummingbird not connected");

        let result = guarded.perform("/hummingbird/in/light/1/A").await;

        assert!(matches!(result, Err(LinkError::DeviceNotConnected { .. })));
        assert_eq!(inner.calls(), vec!["/hummingbird/in/light/1/A".to_string()]);
    }
}
