//! Error handling types for robolink
//!
//! This module provides the error taxonomy shared by the transport, the
//! output dispatcher and the read cache.

use thiserror::Error;

/// Comprehensive error type for device link operations.
///
/// Errors are `Clone` so that one failed transport call can be handed to
/// every reader waiting on the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The control server could not be reached
    #[error("Could not connect to the control server at {url}: {message}")]
    Connectivity { url: String, message: String },

    /// The server answered, but reports that no robot is attached
    #[error("No robot connected ({sentinel})")]
    DeviceNotConnected { sentinel: String },

    /// The configured request deadline elapsed
    #[error("Request to {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },

    /// The payload could not be decoded as a sensor value
    #[error("Malformed payload {payload:?}: {message}")]
    Parse { payload: String, message: String },

    /// The device protocol has no request for this sensor or output
    #[error("Unsupported by this device: {what}")]
    Unsupported { what: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error (message only, so the error stays cloneable)
    #[error("IO error: {0}")]
    Io(String),

    /// A link was constructed outside of a tokio runtime
    #[error("No tokio runtime available to drive transport calls")]
    NoRuntime,
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.to_string())
    }
}

/// Helper functions for common error patterns
impl LinkError {
    /// Create a connectivity error
    pub fn connectivity(url: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Connectivity {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a device-not-connected error
    pub fn not_connected(sentinel: impl Into<String>) -> Self {
        LinkError::DeviceNotConnected {
            sentinel: sentinel.into(),
        }
    }

    /// Create a parse error
    pub fn parse(payload: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Parse {
            payload: payload.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-request error
    pub fn unsupported(what: impl Into<String>) -> Self {
        LinkError::Unsupported { what: what.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        LinkError::Config {
            message: message.into(),
        }
    }

    /// True for failures raised at or behind the transport boundary.
    ///
    /// These are the failures that end an outstanding send without
    /// retrying, and that the failure channel publishes.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            LinkError::Connectivity { .. }
                | LinkError::DeviceNotConnected { .. }
                | LinkError::Timeout { .. }
        )
    }
}
