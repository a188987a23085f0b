//! Random-access reads over an open table file.

use std::io::{self, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::error::Result;

/// A read-only, randomly-addressable byte source.
///
/// Purely mechanical: no caching, no retries. Reads run on the calling task
/// and fail with [`crate::SstError::Io`] on short reads, out-of-bounds
/// ranges, or underlying I/O failure.
pub struct RandomAccessFile {
    file: Mutex<File>,
    len: u64,
}

impl RandomAccessFile {
    /// Opens `path` read-only and records its length.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }

    /// Length of the underlying file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// The range is validated against the file length before any I/O, so a
    /// handle pointing past end-of-file fails fast instead of short-reading.
    pub async fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let end = offset.checked_add(len as u64);
        if end.is_none() || end.is_some_and(|e| e > self.len) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {len} bytes at offset {offset} past end of file ({} bytes)",
                    self.len
                ),
            )
            .into());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SstError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_exact_ranges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let file = RandomAccessFile::open(&path).await.unwrap();
        assert_eq!(file.len(), 10);

        assert_eq!(file.read_range(0, 4).await.unwrap().as_ref(), b"0123");
        assert_eq!(file.read_range(6, 4).await.unwrap().as_ref(), b"6789");
        assert_eq!(file.read_range(10, 0).await.unwrap().as_ref(), b"");
    }

    #[tokio::test]
    async fn rejects_out_of_bounds_reads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let file = RandomAccessFile::open(&path).await.unwrap();

        assert!(matches!(
            file.read_range(8, 4).await,
            Err(SstError::Io(_))
        ));
        assert!(matches!(
            file.read_range(11, 1).await,
            Err(SstError::Io(_))
        ));
        assert!(matches!(
            file.read_range(u64::MAX, 2).await,
            Err(SstError::Io(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let result = RandomAccessFile::open("/no/such/sstdump/file").await;
        assert!(matches!(result, Err(SstError::Io(_))));
    }
}
