//! HTTP networking module
//!
//! Provides the shared HTTP client used by every external source client.

mod client;

pub use client::HttpClient;
