//! Error types for sstdump operations.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while opening or reading an SSTable.
///
/// The enum is `Clone` (I/O errors are held behind an `Arc`) so a table
/// iterator can latch the first failure and hand the same error back from
/// every subsequent call.
#[derive(Debug, Clone, Error)]
pub enum SstError {
    /// I/O error from filesystem operations, including short reads and
    /// reads past the end of the file.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The footer magic did not match; this is not an SSTable.
    #[error("not an sstable: bad magic {found:#018x}")]
    BadMagic { found: u64 },

    /// The file is smaller than the fixed-size footer.
    #[error("file too small to contain footer: {file_size} bytes")]
    TruncatedFooter { file_size: u64 },

    /// CRC mismatch on a block or the footer, indicating corruption.
    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        expected: u32,
        actual: u32,
        offset: u64,
    },

    /// A block trailer carried a compression tag this reader cannot decode.
    #[error("unsupported compression tag {tag} in block at offset {offset}")]
    UnsupportedCompression { tag: u8, offset: u64 },

    /// The footer declared a format revision this reader does not know.
    #[error("unsupported sstable format version {0}")]
    UnsupportedVersion(u8),

    /// Encoded lengths overran the block, the restart table is inconsistent,
    /// or keys are out of order. Always corruption, never retried.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Compression of a payload failed.
    #[error("compression failed: {0}")]
    Compress(String),

    /// Decompression of a block that passed its checksum failed.
    #[error("decompression failed: {0}")]
    Decompress(String),
}

impl SstError {
    /// Prefixes corruption-class errors with the file offset of the block
    /// they were found in.
    pub(crate) fn with_block_offset(self, offset: u64) -> Self {
        match self {
            SstError::MalformedRecord(reason) => {
                SstError::MalformedRecord(format!("block at offset {offset}: {reason}"))
            }
            SstError::Decompress(reason) => {
                SstError::Decompress(format!("block at offset {offset}: {reason}"))
            }
            other => other,
        }
    }
}

impl From<io::Error> for SstError {
    fn from(err: io::Error) -> Self {
        SstError::Io(Arc::new(err))
    }
}

/// Result type alias for SSTable operations.
pub type Result<T> = std::result::Result<T, SstError>;
