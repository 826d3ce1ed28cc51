//! Shared test helpers for integration tests.

#[path = "helpers_transport.rs"]
pub mod transport;

#[path = "helpers_host.rs"]
pub mod host;
