//! # Byte Sources
//!
//! Random-access byte providers the waveform core reads from.
//!
//! ## Overview
//!
//! The core depends only on [`ByteSource`]: a known total size plus exact
//! half-open range reads. Concrete transports are a closed set described by
//! [`SourceLocation`]; adding a transport means adding a variant here.
//!
//! Sources do no caching of their own. Chunk caching, de-duplication and
//! prefetch live in [`crate::cache`].

mod file;
mod http;
mod memory;

pub use file::FileSource;
pub use http::HttpRangeSource;
pub use memory::MemorySource;

use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, WaveformError};

/// Transport behind a live [`ByteSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    LocalFile,
    HttpRange,
    Memory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::LocalFile => f.write_str("file"),
            SourceKind::HttpRange => f.write_str("http-range"),
            SourceKind::Memory => f.write_str("memory"),
        }
    }
}

/// Random-access byte source.
///
/// `read_range` must return exactly `end - start` bytes or fail; a short read
/// is an error, never a smaller buffer.
#[async_trait]
pub trait ByteSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Log-safe description (no credentials, no full paths).
    fn describe(&self) -> String;

    /// Total size in bytes.
    async fn size(&self) -> Result<u64>;

    /// Read the half-open byte range `[start, end)`.
    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes>;

    /// Release any handles held by the source.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Where a waveform file lives.
#[derive(Debug, Clone)]
pub enum SourceLocation {
    /// A file on local disk.
    LocalFile { path: PathBuf },
    /// A remote resource served with HTTP byte-range support.
    HttpRange {
        url: String,
        /// Sent with every request (e.g. `Authorization`).
        headers: HashMap<String, String>,
    },
    /// Bytes already in memory.
    Memory { data: Bytes },
}

impl SourceLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SourceLocation::LocalFile { path: path.into() }
    }

    pub fn http(url: impl Into<String>) -> Self {
        SourceLocation::HttpRange {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn memory(data: impl Into<Bytes>) -> Self {
        SourceLocation::Memory { data: data.into() }
    }

    /// Add a request header. Has no effect on non-HTTP locations.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let SourceLocation::HttpRange { headers, .. } = &mut self {
            headers.insert(key.into(), value.into());
        }
        self
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceLocation::LocalFile { .. } => SourceKind::LocalFile,
            SourceLocation::HttpRange { .. } => SourceKind::HttpRange,
            SourceLocation::Memory { .. } => SourceKind::Memory,
        }
    }

    /// Materialise a live source.
    ///
    /// Remote locations need an `HttpClient`; local files are opened here so a
    /// missing file fails before a session is created.
    pub async fn connect(
        self,
        http_client: Option<Arc<dyn HttpClient>>,
    ) -> Result<Arc<dyn ByteSource>> {
        match self {
            SourceLocation::LocalFile { path } => Ok(Arc::new(FileSource::open(path).await?)),
            SourceLocation::HttpRange { url, headers } => {
                let client = http_client.ok_or_else(|| {
                    WaveformError::InvalidConfig(
                        "HTTP range source requires an HttpClient".to_string(),
                    )
                })?;
                Ok(Arc::new(HttpRangeSource::new(client, url).with_headers(headers)))
            }
            SourceLocation::Memory { data } => Ok(Arc::new(MemorySource::new(data))),
        }
    }
}

/// Reject inverted ranges before any I/O.
pub(crate) fn check_range(start: u64, end: u64) -> Result<u64> {
    end.checked_sub(start).ok_or_else(|| {
        WaveformError::OutOfRange(format!("byte range {}..{} is inverted", start, end))
    })
}
