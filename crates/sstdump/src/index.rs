//! Index and meta blocks: blocks whose values locate other blocks.
//!
//! The index block maps separator keys to data-block handles. A separator is
//! >= the largest key of the block it covers and < the smallest key of the
//! next block, so the block that may contain `target` is the first index
//! entry whose separator is >= `target`:
//!
//! ```text
//! Block 0: keys a..c   separator "c"   ← seek("b") and seek("c") land here
//! Block 1: keys d..f   separator "f"   ← seek("ca") lands here
//! Block 2: keys g..k   separator "k"
//!                                        seek("z") → past-end
//! ```
//!
//! The metaindex block maps meta-block names to handles the same way; its
//! keys are internal names and always ordered bytewise.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::block::Block;
use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::{Result, SstError};
use crate::format::{decode_varint, BlockHandle};

/// One index entry: the separator key bounding a data block, and where that
/// block lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub separator: Bytes,
    pub handle: BlockHandle,
}

/// Materialized index block, binary-searchable by separator key.
#[derive(Debug, Clone)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Materializes index entries from a decoded block.
    ///
    /// Values must be exactly handle-sized and separators must be strictly
    /// increasing under `comparator`; anything else is corruption.
    pub fn from_block(block: &Block, comparator: Arc<dyn Comparator>) -> Result<Self> {
        let mut entries = Vec::new();
        let mut iter = block.iter(comparator.clone());
        iter.seek_to_first()?;

        while iter.valid() {
            let separator = Bytes::copy_from_slice(iter.key());
            let handle = BlockHandle::decode(iter.value()).map_err(|e| match e {
                SstError::MalformedRecord(reason) => {
                    SstError::MalformedRecord(format!("index entry: {reason}"))
                }
                other => other,
            })?;

            if let Some(prev) = entries.last() {
                if comparator.compare(&separator, &prev.separator) != Ordering::Greater {
                    return Err(SstError::MalformedRecord(format!(
                        "index separators out of order: {:02x?} does not follow {:02x?}",
                        separator.as_ref(),
                        prev.separator.as_ref()
                    )));
                }
            }

            entries.push(IndexEntry { separator, handle });
            iter.next()?;
        }

        Ok(Self { entries })
    }

    /// Position of the first entry whose separator is >= `target`, i.e. the
    /// only data block that can contain `target`. `None` means `target` is
    /// past every block in the table.
    ///
    /// A target equal to a separator resolves to that separator's block:
    /// separators are inclusive upper bounds.
    pub fn seek(&self, comparator: &dyn Comparator, target: &[u8]) -> Option<usize> {
        let pos = self
            .entries
            .partition_point(|e| comparator.compare(&e.separator, target) == Ordering::Less);
        (pos < self.entries.len()).then_some(pos)
    }

    pub fn get(&self, pos: usize) -> Option<&IndexEntry> {
        self.entries.get(pos)
    }

    /// Number of data blocks in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Materialized metaindex block: meta-block name → handle.
#[derive(Debug, Clone)]
pub struct MetaIndex {
    entries: Vec<(Bytes, BlockHandle)>,
}

impl MetaIndex {
    /// Materializes the metaindex. Names are ordered bytewise regardless of
    /// the table's key comparator.
    pub fn from_block(block: &Block) -> Result<Self> {
        let mut entries = Vec::new();
        let mut iter = block.iter(Arc::new(BytewiseComparator));
        iter.seek_to_first()?;

        while iter.valid() {
            let name = Bytes::copy_from_slice(iter.key());
            let handle = BlockHandle::decode(iter.value()).map_err(|e| match e {
                SstError::MalformedRecord(reason) => {
                    SstError::MalformedRecord(format!("metaindex entry: {reason}"))
                }
                other => other,
            })?;
            entries.push((name, handle));
            iter.next()?;
        }

        Ok(Self { entries })
    }

    /// Looks up a meta block by name.
    pub fn get(&self, name: &[u8]) -> Option<BlockHandle> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, h)| *h)
    }
}

/// Table-level statistics recorded by the table writer, stored in a meta
/// block of varint-valued properties. Unknown property names are ignored so
/// newer writers stay readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableProperties {
    pub entry_count: u64,
    pub data_block_count: u64,
    pub raw_key_size: u64,
    pub raw_value_size: u64,
}

impl TableProperties {
    /// Metaindex name of the properties block.
    pub const META_KEY: &'static [u8] = b"sstdump.properties";

    /// Decodes recognized properties from the properties block.
    pub fn from_block(block: &Block) -> Result<Self> {
        let mut props = TableProperties::default();
        let mut iter = block.iter(Arc::new(BytewiseComparator));
        iter.seek_to_first()?;

        while iter.valid() {
            let mut value = iter.value();
            let slot = match iter.key() {
                b"data_block_count" => Some(&mut props.data_block_count),
                b"entry_count" => Some(&mut props.entry_count),
                b"raw_key_size" => Some(&mut props.raw_key_size),
                b"raw_value_size" => Some(&mut props.raw_value_size),
                _ => None,
            };
            if let Some(slot) = slot {
                *slot = decode_varint(&mut value).map_err(|e| match e {
                    SstError::MalformedRecord(reason) => {
                        SstError::MalformedRecord(format!("properties block: {reason}"))
                    }
                    other => other,
                })?;
            }
            iter.next()?;
        }

        Ok(props)
    }
}
