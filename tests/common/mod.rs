//! Shared test-only support: a spawnable server harness plus an HTTP client
//! speaking proxygate's wire shapes.

pub mod harness;
pub mod http_client;
