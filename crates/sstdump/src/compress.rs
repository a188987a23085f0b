//! Block compression and decompression.
//!
//! Blocks are compressed independently; the codec is recorded in each
//! block's trailer tag, so a single file can in principle mix codecs.
//!
//! - **LZ4**: fast decompression, the usual choice for hot data.
//! - **Zstd**: higher ratio, slower; suits cold tables.
//!
//! The encode direction is retained for format symmetry and external
//! tooling (test fixtures build tables with it); the reader itself only
//! decompresses.

use crate::error::{Result, SstError};
use crate::format::Compression;

/// Compresses data using the specified algorithm.
///
/// Returns the original data unchanged for `Compression::None`.
pub fn compress(data: &[u8], algo: Compression) -> Result<Vec<u8>> {
    match algo {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => compress_lz4(data),
        Compression::Zstd => compress_zstd(data),
    }
}

/// Decompresses data using the specified algorithm.
pub fn decompress(data: &[u8], algo: Compression) -> Result<Vec<u8>> {
    match algo {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => decompress_lz4(data),
        Compression::Zstd => decompress_zstd(data),
    }
}

fn compress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::compress(data, None, false).map_err(|e| SstError::Compress(e.to_string()))
}

/// Decompresses LZ4 block data.
///
/// Blocks are small; the 256KB bound keeps a corrupt length field from
/// turning into an unbounded allocation.
fn decompress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    let max_size = 256 * 1024;
    lz4::block::decompress(data, Some(max_size))
        .map_err(|e| SstError::Decompress(e.to_string()))
}

fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3).map_err(|e| SstError::Compress(e.to_string()))
}

fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| SstError::Decompress(e.to_string()))
}
