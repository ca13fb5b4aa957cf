//! HTTP client module
//!
//! Provides the client used to call the weather service.
//!
//! # Features
//!
//! - **Base URL**: relative paths are joined onto a configured base
//! - **Default Headers**: applied to every request
//! - **Timeouts**: per client, overridable per request
//!
//! Retries are left to whoever schedules the caller.

mod client;

pub use client::{HttpClient, HttpClientConfig, RequestOptions};
