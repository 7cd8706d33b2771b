//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the waveform core:
//! - Logging and tracing infrastructure
//! - Log redaction helpers for source locations
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions used throughout the system and the
//! bridge between `tracing` events and a host [`LoggerSink`](bridge_traits::LoggerSink).

pub mod error;
pub mod logging;

pub use error::{Error, Result};
