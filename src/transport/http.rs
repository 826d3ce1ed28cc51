//! HTTP transport backed by `reqwest`.

use std::time::Duration;

use url::Url;

use super::{LOG_TARGET, Transport, TransportFuture};
use crate::error::{LinkError, LinkResult};

/// GET-per-call transport against a fixed local base address.
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport for `base`. With a `timeout`, calls that exceed it
    /// fail with [`LinkError::Timeout`].
    pub fn new(base: &Url, timeout: Option<Duration>) -> LinkResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LinkError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> LinkError {
        if err.is_timeout() {
            LinkError::Timeout {
                url: url.to_string(),
                after_ms: self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
            }
        } else {
            LinkError::connectivity(url, err.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn perform<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            let url = self.url_for(path);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| self.classify(&url, e))?;

            // Status is not a failure signal on its own; the server reports
            // an absent robot through the payload.
            let status = response.status();
            let payload = response.text().await.map_err(|e| self.classify(&url, e))?;

            log::debug!(
                target: LOG_TARGET,
                "GET {} -> {} ({} bytes)",
                url,
                status,
                payload.len()
            );
            Ok(payload)
        })
    }
}
