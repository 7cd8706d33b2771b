use async_trait::async_trait;
use bytes::Bytes;

use super::{check_range, ByteSource, SourceKind};
use crate::error::{Result, WaveformError};

/// Byte source over an in-memory buffer.
///
/// Reads are zero-copy slices of the shared buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }

    fn describe(&self) -> String {
        format!("memory:{}B", self.data.len())
    }

    async fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        check_range(start, end)?;
        if end > self.data.len() as u64 {
            return Err(WaveformError::OutOfRange(format!(
                "byte range {}..{} exceeds buffer of {} bytes",
                start,
                end,
                self.data.len()
            )));
        }
        Ok(self.data.slice(start as usize..end as usize))
    }
}
