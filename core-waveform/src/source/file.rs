use async_trait::async_trait;
use bytes::Bytes;
use core_runtime::logging::strip_path;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::debug;

use super::{check_range, ByteSource, SourceKind};
use crate::error::{Result, WaveformError};

/// Local file read through a single seekable handle.
///
/// Reads are serialised on the handle; the file's length is captured at open.
pub struct FileSource {
    path: PathBuf,
    size: u64,
    file: Mutex<File>,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            WaveformError::SourceUnavailable(format!(
                "cannot open {}: {}",
                strip_path(&path.to_string_lossy()),
                e
            ))
        })?;
        let size = file.metadata().await?.len();

        debug!(
            file = %strip_path(&path.to_string_lossy()),
            size,
            "Opened local waveform file"
        );

        Ok(Self {
            path,
            size,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalFile
    }

    fn describe(&self) -> String {
        format!("file:{}", strip_path(&self.path.to_string_lossy()))
    }

    async fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let len = check_range(start, end)?;
        if len == 0 {
            return Ok(Bytes::new());
        }
        if end > self.size {
            return Err(WaveformError::OutOfRange(format!(
                "byte range {}..{} exceeds file size {}",
                start, end, self.size
            )));
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = Vec::with_capacity(len as usize);
        (&mut *file).take(len).read_to_end(&mut buf).await?;

        if buf.len() as u64 != len {
            // File shrank after open
            return Err(WaveformError::integrity(
                format!("{} bytes {}..{}", self.describe(), start, end),
                len,
                buf.len() as u64,
            ));
        }

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "core-waveform-file-source-{}-{}",
            std::process::id(),
            name
        ));
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_reads_exact_ranges() {
        let path = temp_file("exact", b"0123456789").await;
        let source = FileSource::open(&path).await.unwrap();

        assert_eq!(source.size().await.unwrap(), 10);
        assert_eq!(&source.read_range(2, 5).await.unwrap()[..], b"234");
        assert_eq!(&source.read_range(0, 10).await.unwrap()[..], b"0123456789");
        assert!(source.read_range(7, 7).await.unwrap().is_empty());
        assert!(source.describe().ends_with("exact"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_ranges_past_end() {
        let path = temp_file("past-end", b"abcd").await;
        let source = FileSource::open(&path).await.unwrap();

        assert!(matches!(
            source.read_range(2, 6).await,
            Err(WaveformError::OutOfRange(_))
        ));
        assert!(matches!(
            source.read_range(3, 1).await,
            Err(WaveformError::OutOfRange(_))
        ));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_truncation_after_open_is_an_integrity_error() {
        let path = temp_file("shrink", b"abcdefgh").await;
        let source = FileSource::open(&path).await.unwrap();

        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(5)
            .unwrap();

        let err = source.read_range(2, 8).await.unwrap_err();
        assert!(matches!(
            err,
            WaveformError::ChunkIntegrity {
                expected: 6,
                actual: 3,
                ..
            }
        ));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let result = FileSource::open("/definitely/not/here.wvfm").await;
        assert!(matches!(result, Err(WaveformError::SourceUnavailable(_))));
    }
}
