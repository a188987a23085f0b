//! Read-only decoding and iteration for immutable sorted string tables
//! (SSTables).
//!
//! An SSTable is a write-once, disk-resident file of sorted key-value pairs
//! laid out in blocks. This crate turns such a file into an ordered, lazily
//! decoded stream of entries without loading the file into memory: only the
//! footer, index, and meta blocks are held resident; data blocks are fetched
//! and decoded as iteration reaches them.
//!
//! # Read Path
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ SstReader::open                                             │
//! │   RandomAccessFile → Footer → Index block → [Metaindex]     │
//! │                                                             │
//! │ SstIterator                                                 │
//! │   seek(key) ──→ Index (separator binary search)             │
//! │                    ↓                                        │
//! │              BlockHandle ──→ read + CRC + decompress        │
//! │                    ↓                                        │
//! │              BlockIterator (restart-point binary search,    │
//! │                             prefix-decode linear scan)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The on-disk layout (footer, block trailers, prefix-compressed records,
//! restart points) is documented in [`format`].
//!
//! # Invariants
//!
//! - Keys are strictly increasing under the table's comparator, within and
//!   across blocks; a violation surfaces as corruption, never as silently
//!   reordered output.
//! - Every block is checksum-verified before it is decoded; a corrupt block
//!   fails the iterator and latches the error rather than being skipped.
//! - The reader never mutates the file and spawns no background work; reads
//!   run on the calling task.
//!
//! # Example
//!
//! ```no_run
//! use sstdump::SstReader;
//! use std::sync::Arc;
//!
//! # async fn example() -> sstdump::Result<()> {
//! let reader = Arc::new(SstReader::open("data.sst").await?);
//!
//! // Full scan.
//! let mut iter = reader.clone().iter();
//! while let Some((key, value)) = iter.try_next().await? {
//!     println!("{:?} = {:?}", key, value);
//! }
//!
//! // Positioned reads.
//! let mut iter = reader.clone().iter();
//! iter.seek(b"needle").await?;
//! if iter.valid() {
//!     println!("first key >= needle: {:?}", iter.key());
//! }
//! # Ok(())
//! # }
//! ```

mod block;
mod comparator;
pub mod compress;
mod error;
mod file;
pub mod format;
mod index;
mod iterator;
mod reader;

pub use block::{Block, BlockIterator};
pub use comparator::{BytewiseComparator, Comparator};
pub use error::{Result, SstError};
pub use file::RandomAccessFile;
pub use format::{
    BlockHandle, Compression, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE, FORMAT_VERSION, HANDLE_SIZE,
    SST_MAGIC,
};
pub use index::{Index, IndexEntry, MetaIndex, TableProperties};
pub use iterator::SstIterator;
pub use reader::{SstReadOptions, SstReader};

// Re-export for convenience
pub use bytes::Bytes;
