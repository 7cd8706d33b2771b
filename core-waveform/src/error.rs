//! # Waveform Error Types
//!
//! Error taxonomy for out-of-core waveform access.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Reasons a waveform file fails header validation.
///
/// Kept separate from [`WaveformError`] so callers can react differently to a
/// wrong file (bad magic) and a damaged one (size mismatch).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("header needs {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported version {found}, expected {expected}")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error("sample rate must be >= 1 Hz, got {0}")]
    InvalidSampleRate(u32),

    #[error("size mismatch: header implies {expected} bytes, source has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Errors that can occur while opening or reading a waveform session.
///
/// `Clone` because a single failed in-flight load is reported to every caller
/// waiting on it.
#[derive(Error, Debug, Clone)]
pub enum WaveformError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Size probe or range read failed at the byte source.
    #[error("Byte source unavailable: {0}")]
    SourceUnavailable(String),

    /// Remote source does not honour partial-content semantics.
    #[error("Range requests not supported: {0}")]
    RangeUnsupported(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Header failed validation.
    #[error("Invalid waveform format: {0}")]
    InvalidFormat(#[from] FormatError),

    /// A read returned a different number of bytes than requested.
    #[error("Chunk integrity error ({context}): expected {expected} bytes, got {actual}")]
    ChunkIntegrity {
        context: String,
        expected: u64,
        actual: u64,
    },

    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Invalid chunk index or sample range.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Operation aborted by the caller's cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation on an engine with no open session.
    #[error("No waveform session is open")]
    SessionClosed,

    /// Session configuration rejected by `SessionConfig::validate`.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WaveformError {
    /// Returns `true` if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WaveformError::SourceUnavailable(_) | WaveformError::ChunkIntegrity { .. }
        )
    }

    /// Returns `true` if the file itself was rejected.
    pub fn is_format_error(&self) -> bool {
        matches!(self, WaveformError::InvalidFormat(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaveformError::Cancelled)
    }

    pub(crate) fn integrity(context: impl Into<String>, expected: u64, actual: u64) -> Self {
        WaveformError::ChunkIntegrity {
            context: context.into(),
            expected,
            actual,
        }
    }
}

impl From<BridgeError> for WaveformError {
    fn from(err: BridgeError) -> Self {
        WaveformError::SourceUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for WaveformError {
    fn from(err: std::io::Error) -> Self {
        WaveformError::SourceUnavailable(err.to_string())
    }
}

/// Result type for waveform operations.
pub type Result<T> = std::result::Result<T, WaveformError>;
