//! # Strided Preview
//!
//! Cheap min/max overview of a whole file built from one short direct read
//! per output point. Bypasses the chunk cache so scanning a huge file does
//! not evict the detail view's working set.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{Result, WaveformError};
use crate::header::{decode_samples, WaveformHeader, BYTES_PER_SAMPLE};
use crate::source::ByteSource;

/// Samples read per preview point when the caller does not choose.
pub const DEFAULT_PREVIEW_WINDOW: u32 = 2048;

/// Envelope of one preview bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewPoint {
    pub min: f32,
    pub max: f32,
}

/// Downsampled overview of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub points: Vec<PreviewPoint>,
    /// Source samples spanned by each point
    pub samples_per_point: f64,
    pub sample_rate_hz: u32,
    pub sample_count: u32,
}

impl Preview {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Build a `points`-wide preview, reading at most `window_samples` at the
/// start of each bucket.
///
/// `points` is capped at the sample count. Reads are sequential and each
/// one races the cancellation token.
#[instrument(skip(source, header, cancel), fields(source = %source.describe()))]
pub async fn build_preview(
    source: &dyn ByteSource,
    header: &WaveformHeader,
    points: usize,
    window_samples: u32,
    cancel: &CancellationToken,
) -> Result<Preview> {
    let sample_count = header.sample_count as u64;
    let points = (points as u64).min(sample_count);

    let mut preview = Preview {
        points: Vec::with_capacity(points as usize),
        samples_per_point: if points == 0 {
            0.0
        } else {
            sample_count as f64 / points as f64
        },
        sample_rate_hz: header.sample_rate_hz,
        sample_count: header.sample_count,
    };

    for bucket in 0..points {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let bucket_start = bucket * sample_count / points;
        let bucket_end = (bucket + 1) * sample_count / points;
        let window = (window_samples.max(1) as u64).min(bucket_end - bucket_start);
        let range = header.sample_byte_range(bucket_start, bucket_start + window);

        let bytes = tokio::select! {
            read = source.read_range(range.start, range.end) => read?,
            _ = cancel.cancelled() => return Err(WaveformError::Cancelled),
        };

        let values = decode_samples(&bytes);
        if values.is_empty() {
            return Err(WaveformError::integrity(
                format!("preview bucket {}", bucket),
                window * BYTES_PER_SAMPLE,
                0,
            ));
        }

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        preview.points.push(PreviewPoint { min, max });
    }

    debug!(points = preview.len(), "Preview built");
    Ok(preview)
}
