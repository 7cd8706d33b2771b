//! # Header Codec
//!
//! Fixed 20-byte little-endian header followed by `sample_count` `f32` samples.
//!
//! | Offset | Field          | Type    |
//! |--------|----------------|---------|
//! | 0      | magic `WVFM`   | 4 bytes |
//! | 4      | version        | u16     |
//! | 6      | flags          | u16     |
//! | 8      | sample rate Hz | u32     |
//! | 12     | sample count   | u32     |
//! | 16     | reserved       | u32     |

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

use crate::error::{FormatError, Result, WaveformError};

/// File signature.
pub const MAGIC: [u8; 4] = *b"WVFM";

/// The only supported format version.
pub const VERSION: u16 = 1;

/// Header length in bytes.
pub const HEADER_SIZE: usize = 20;

/// Bytes per encoded sample.
pub const BYTES_PER_SAMPLE: u64 = 4;

/// Parsed and validated file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformHeader {
    pub version: u16,
    pub sample_rate_hz: u32,
    pub sample_count: u32,
    pub file_size_bytes: u64,
    pub header_size_bytes: u32,
}

impl WaveformHeader {
    /// Playback length of the payload.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.sample_count as f64 / self.sample_rate_hz as f64)
    }

    /// Number of chunks of `chunk_samples` needed to cover the payload.
    pub fn chunk_count(&self, chunk_samples: u32) -> u32 {
        if chunk_samples == 0 {
            return 0;
        }
        self.sample_count.div_ceil(chunk_samples)
    }

    /// Byte range of the half-open sample range `[start, end)`.
    pub fn sample_byte_range(&self, start: u64, end: u64) -> Range<u64> {
        let base = self.header_size_bytes as u64;
        base + start * BYTES_PER_SAMPLE..base + end * BYTES_PER_SAMPLE
    }

    pub fn payload_bytes(&self) -> u64 {
        self.sample_count as u64 * BYTES_PER_SAMPLE
    }
}

/// Parse the leading bytes of a source and cross-check them against its size.
///
/// Checks run in order: length, magic, version, sample rate, total size.
pub fn parse_header(
    bytes: &[u8],
    total_size: u64,
) -> std::result::Result<WaveformHeader, FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::Truncated {
            needed: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut buf = &bytes[..HEADER_SIZE];

    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(FormatError::BadMagic {
            expected: MAGIC,
            found: magic,
        });
    }

    let version = buf.get_u16_le();
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion {
            expected: VERSION,
            found: version,
        });
    }

    let _flags = buf.get_u16_le();
    let sample_rate_hz = buf.get_u32_le();
    let sample_count = buf.get_u32_le();
    let _reserved = buf.get_u32_le();

    if sample_rate_hz < 1 {
        return Err(FormatError::InvalidSampleRate(sample_rate_hz));
    }

    let expected = HEADER_SIZE as u64 + sample_count as u64 * BYTES_PER_SAMPLE;
    if expected != total_size {
        return Err(FormatError::SizeMismatch {
            expected,
            actual: total_size,
        });
    }

    Ok(WaveformHeader {
        version,
        sample_rate_hz,
        sample_count,
        file_size_bytes: total_size,
        header_size_bytes: HEADER_SIZE as u32,
    })
}

/// Encode a version-1 header with zeroed flags and reserved fields.
pub fn encode_header(sample_rate_hz: u32, sample_count: u32) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    let mut buf = &mut out[..];
    buf.put_slice(&MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u16_le(0);
    buf.put_u32_le(sample_rate_hz);
    buf.put_u32_le(sample_count);
    buf.put_u32_le(0);
    out
}

/// Encode a complete file: header plus little-endian `f32` payload.
///
/// Fails with `OutOfRange` when `samples.len()` does not fit the `u32`
/// sample count field.
pub fn encode_waveform(sample_rate_hz: u32, samples: &[f32]) -> Result<Bytes> {
    let sample_count = u32::try_from(samples.len()).map_err(|_| {
        WaveformError::OutOfRange(format!("{} samples exceed u32::MAX", samples.len()))
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + samples.len() * 4);
    buf.put_slice(&encode_header(sample_rate_hz, sample_count));
    for &sample in samples {
        buf.put_f32_le(sample);
    }
    Ok(buf.freeze())
}

/// Decode a little-endian `f32` payload.
pub(crate) fn decode_samples(mut bytes: &[u8]) -> Vec<f32> {
    let mut values = Vec::with_capacity(bytes.len() / 4);
    while bytes.remaining() >= 4 {
        values.push(bytes.get_f32_le());
    }
    values
}
