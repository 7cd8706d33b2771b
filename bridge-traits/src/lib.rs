//! # Host Bridge Traits
//!
//! Capability traits the waveform core requires from its host.
//!
//! ## Overview
//!
//! The core never talks to a network stack or a logging backend directly.
//! Each capability is a trait here, with a desktop implementation living in
//! `bridge-desktop` and test doubles living next to the tests that need them.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with byte-range helpers, used by
//!   the remote byte source
//! - [`LoggerSink`](log::LoggerSink) - Mirror structured logs into a host pipeline
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform-specific errors into it and keep messages actionable
//! (include the URL or operation that failed).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! between the chunk loader tasks of a session.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod log;

pub use error::BridgeError;

pub use http::{ContentRange, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{BufferedLogSink, LogEntry, LogLevel, LoggerSink};
