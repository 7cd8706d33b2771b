//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with connection pooling and retry on
//!   transient failures. Remote waveform sources issue many small range
//!   requests against one origin, so a single shared client is expected.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use core_waveform::{SessionConfig, SourceLocation, WaveformEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let source = SourceLocation::http("https://example.com/capture.wvfm")
//!         .connect(Some(http_client))?;
//!
//!     let engine = WaveformEngine::new();
//!     engine.open(source, SessionConfig::remote()).await?;
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
