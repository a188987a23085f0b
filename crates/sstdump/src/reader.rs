//! Table reader: opens a file, validates its footer, and decodes blocks on
//! demand.
//!
//! Opening loads only the footer, the index block, and (when present) the
//! metaindex and properties blocks. Data blocks are fetched lazily as
//! iterators touch them, optionally through an LRU cache of decoded blocks.
//!
//! A reader is immutable after open and safely shared across tasks via
//! `Arc`; each iterator drawn from it carries its own cursor.
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
//! let mut iter = reader.clone().iter();
//! while let Some((key, value)) = iter.try_next().await? {
//!     println!("{:?} = {:?}", key, value);
//! }
//! # Ok(())
//! # }
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::block::Block;
use crate::comparator::{BytewiseComparator, Comparator};
use crate::compress;
use crate::error::{Result, SstError};
use crate::file::RandomAccessFile;
use crate::format::{BlockHandle, Compression, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE};
use crate::index::{Index, MetaIndex, TableProperties};
use crate::iterator::SstIterator;

/// Options applied when opening a table.
pub struct SstReadOptions {
    /// Key order the table was written under.
    pub comparator: Arc<dyn Comparator>,
    /// Decoded-block cache size in MB; 0 disables caching.
    pub block_cache_mb: usize,
}

impl Default for SstReadOptions {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator),
            block_cache_mb: 64,
        }
    }
}

/// An open, immutable SSTable.
pub struct SstReader {
    file: RandomAccessFile,
    path: PathBuf,
    file_size: u64,
    footer: Footer,
    index: Index,
    properties: Option<TableProperties>,
    comparator: Arc<dyn Comparator>,
    /// LRU cache of decoded blocks keyed by file offset.
    block_cache: Option<Mutex<LruCache<u64, Block>>>,
}

impl SstReader {
    /// Opens an SSTable with the default comparator and a 64MB block cache.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, SstReadOptions::default()).await
    }

    /// Opens an SSTable, validating the footer and loading the index and
    /// meta blocks into memory.
    pub async fn open_with_options(
        path: impl AsRef<Path>,
        options: SstReadOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = RandomAccessFile::open(&path).await?;
        let file_size = file.len();

        if file_size < FOOTER_SIZE as u64 {
            return Err(SstError::TruncatedFooter { file_size });
        }

        let footer_offset = file_size - FOOTER_SIZE as u64;
        let footer_bytes = file.read_range(footer_offset, FOOTER_SIZE).await?;
        let footer = Footer::decode(&footer_bytes, footer_offset)?;

        check_handle_bounds(footer.index_handle, footer_offset, "index")?;
        if let Some(meta_handle) = footer.metaindex_handle {
            check_handle_bounds(meta_handle, footer_offset, "metaindex")?;
        }

        let index_block = read_block_from(&file, footer.index_handle).await?;
        let index = Index::from_block(&index_block, options.comparator.clone())?;

        let mut properties = None;
        if let Some(meta_handle) = footer.metaindex_handle {
            let meta_block = read_block_from(&file, meta_handle).await?;
            let metaindex = MetaIndex::from_block(&meta_block)?;
            if let Some(props_handle) = metaindex.get(TableProperties::META_KEY) {
                check_handle_bounds(props_handle, footer_offset, "properties")?;
                let props_block = read_block_from(&file, props_handle).await?;
                properties = Some(TableProperties::from_block(&props_block)?);
            }
        }

        let block_cache = if options.block_cache_mb > 0 {
            // Capacity in blocks, assuming the common 4KB block size.
            let blocks_in_cache = (options.block_cache_mb * 1024 * 1024) / 4096;
            NonZeroUsize::new(blocks_in_cache.max(1))
                .map(|cap| Mutex::new(LruCache::new(cap)))
        } else {
            None
        };

        Ok(Self {
            file,
            path,
            file_size,
            footer,
            index,
            properties,
            comparator: options.comparator,
            block_cache,
        })
    }

    /// Returns an iterator over all entries in the table.
    pub fn iter(self: Arc<Self>) -> SstIterator {
        SstIterator::new(self)
    }

    /// Fetches a data block from the cache or from disk.
    ///
    /// The cache lock is never held across the read or the decode; two
    /// tasks racing on the same block may both decode it, and either fully
    /// decoded copy may end up cached.
    pub(crate) async fn read_block(&self, handle: BlockHandle) -> Result<Block> {
        if let Some(cache) = &self.block_cache {
            if let Some(block) = cache.lock().await.get(&handle.offset) {
                return Ok(block.clone());
            }
        }

        let block = read_block_from(&self.file, handle).await?;

        if let Some(cache) = &self.block_cache {
            cache.lock().await.put(handle.offset, block.clone());
        }

        Ok(block)
    }

    /// The file path this table was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of data blocks in the table.
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// Writer-recorded table statistics, when the table carries them.
    pub fn properties(&self) -> Option<&TableProperties> {
        self.properties.as_ref()
    }

    /// The decoded footer.
    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// The key order this table is searched under.
    pub fn comparator(&self) -> &dyn Comparator {
        self.comparator.as_ref()
    }

    pub(crate) fn comparator_handle(&self) -> Arc<dyn Comparator> {
        self.comparator.clone()
    }

    pub(crate) fn index(&self) -> &Index {
        &self.index
    }
}

/// Ensures a block, trailer included, lies before the footer.
fn check_handle_bounds(handle: BlockHandle, footer_offset: u64, what: &str) -> Result<()> {
    match handle.end_offset() {
        Some(end) if end <= footer_offset => Ok(()),
        _ => Err(SstError::MalformedRecord(format!(
            "{what} block at offset {} size {} overruns the file",
            handle.offset, handle.size
        ))),
    }
}

/// Reads, verifies, decompresses, and decodes one block.
async fn read_block_from(file: &RandomAccessFile, handle: BlockHandle) -> Result<Block> {
    let size = handle.size as usize;
    let raw = file
        .read_range(handle.offset, size + BLOCK_TRAILER_SIZE)
        .await?;

    let expected = u32::from_le_bytes([
        raw[size + 1],
        raw[size + 2],
        raw[size + 3],
        raw[size + 4],
    ]);
    let actual = crc32c::crc32c(&raw[..size + 1]);
    if expected != actual {
        return Err(SstError::ChecksumMismatch {
            expected,
            actual,
            offset: handle.offset,
        });
    }

    let tag = raw[size];
    let compression = Compression::from_u8(tag).ok_or(SstError::UnsupportedCompression {
        tag,
        offset: handle.offset,
    })?;

    let payload = match compression {
        Compression::None => raw.slice(..size),
        _ => Bytes::from(
            compress::decompress(&raw[..size], compression)
                .map_err(|e| e.with_block_offset(handle.offset))?,
        ),
    };

    Block::decode(payload).map_err(|e| e.with_block_offset(handle.offset))
}
