#![allow(dead_code)] // each test binary uses a different slice of the fixture

//! Fixture table writer for integration tests.
//!
//! The library ships no write path, so the tests carry a minimal one: it
//! emits the exact on-disk layout the reader expects (prefix-compressed
//! blocks with restart points, per-block trailers, separator-key index,
//! optional metaindex + properties, fixed footer) using the crate's public
//! format surface.

use std::path::Path;

use sstdump::compress;
use sstdump::{BlockHandle, Compression, Footer, TableProperties};

/// Shape of the fixture table to build.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub entries_per_block: usize,
    pub restart_interval: usize,
    pub compression: Compression,
    pub with_properties: bool,
    /// When set, separators are `last_key ++ 0x00` instead of the last key
    /// itself, exercising seeks that land past a block's final entry.
    pub pad_separators: bool,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            entries_per_block: 16,
            restart_interval: 16,
            compression: Compression::None,
            with_properties: true,
            pad_separators: false,
        }
    }
}

/// A built table plus the block layout, so tests can corrupt bytes at
/// precise locations.
pub struct TableImage {
    pub bytes: Vec<u8>,
    pub data_blocks: Vec<BlockHandle>,
    pub index_handle: BlockHandle,
}

impl TableImage {
    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, &self.bytes).unwrap();
    }

    /// Flips one payload byte of the given data block.
    pub fn corrupt_data_block(&mut self, block: usize) {
        let handle = self.data_blocks[block];
        self.bytes[handle.offset as usize] ^= 0xFF;
    }

    /// Rewrites a data block's compression tag to an unknown codec id and
    /// fixes the trailer CRC so only the tag is at fault.
    pub fn poison_compression_tag(&mut self, block: usize, tag: u8) {
        let handle = self.data_blocks[block];
        let start = handle.offset as usize;
        let tag_pos = start + handle.size as usize;
        self.bytes[tag_pos] = tag;
        let crc = crc32c::crc32c(&self.bytes[start..=tag_pos]);
        self.bytes[tag_pos + 1..tag_pos + 5].copy_from_slice(&crc.to_le_bytes());
    }
}

/// Builds a complete table image from pre-sorted entries.
pub fn build_table(entries: &[(Vec<u8>, Vec<u8>)], spec: &TableSpec) -> TableImage {
    assert!(spec.entries_per_block > 0);

    let mut bytes = Vec::new();
    let mut data_blocks = Vec::new();
    let mut index_entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

    for chunk in entries.chunks(spec.entries_per_block) {
        let payload = build_block_payload(chunk, spec.restart_interval);
        let handle = append_block(&mut bytes, &payload, spec.compression);
        data_blocks.push(handle);

        let mut separator = chunk.last().unwrap().0.clone();
        if spec.pad_separators {
            separator.push(0x00);
        }
        index_entries.push((separator, handle.encode().to_vec()));
    }

    let index_payload = build_block_payload(&index_entries, 1);
    let index_handle = append_block(&mut bytes, &index_payload, Compression::None);

    let metaindex_handle = if spec.with_properties {
        let props = properties_entries(entries, data_blocks.len());
        let props_payload = build_block_payload(&props, 1);
        let props_handle = append_block(&mut bytes, &props_payload, Compression::None);

        let meta_entries = vec![(
            TableProperties::META_KEY.to_vec(),
            props_handle.encode().to_vec(),
        )];
        let meta_payload = build_block_payload(&meta_entries, 1);
        Some(append_block(&mut bytes, &meta_payload, Compression::None))
    } else {
        None
    };

    let footer = Footer::new(index_handle, metaindex_handle);
    bytes.extend_from_slice(&footer.encode());

    TableImage {
        bytes,
        data_blocks,
        index_handle,
    }
}

/// Builds and writes a table in one step.
pub fn write_table(path: &Path, entries: &[(Vec<u8>, Vec<u8>)], spec: &TableSpec) {
    build_table(entries, spec).write_to(path);
}

/// Convenience for string-literal entries.
pub fn entries_of(pairs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    pairs
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

fn properties_entries(
    entries: &[(Vec<u8>, Vec<u8>)],
    data_block_count: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let raw_key_size: u64 = entries.iter().map(|(k, _)| k.len() as u64).sum();
    let raw_value_size: u64 = entries.iter().map(|(_, v)| v.len() as u64).sum();

    // Keys must stay bytewise-sorted.
    vec![
        (
            b"data_block_count".to_vec(),
            encode_varint(data_block_count as u64),
        ),
        (b"entry_count".to_vec(), encode_varint(entries.len() as u64)),
        (b"raw_key_size".to_vec(), encode_varint(raw_key_size)),
        (b"raw_value_size".to_vec(), encode_varint(raw_value_size)),
    ]
}

/// Encodes one block payload: prefix-compressed records, restart array,
/// restart count.
fn build_block_payload(entries: &[(Vec<u8>, Vec<u8>)], restart_interval: usize) -> Vec<u8> {
    assert!(restart_interval > 0);

    let mut buffer = Vec::new();
    let mut restarts: Vec<u32> = vec![0];
    let mut counter = 0usize;
    let mut last_key: Vec<u8> = Vec::new();

    for (key, value) in entries {
        let shared = if counter >= restart_interval {
            restarts.push(buffer.len() as u32);
            counter = 0;
            0
        } else {
            common_prefix_len(&last_key, key)
        };

        buffer.extend_from_slice(&encode_varint(shared as u64));
        buffer.extend_from_slice(&encode_varint((key.len() - shared) as u64));
        buffer.extend_from_slice(&encode_varint(value.len() as u64));
        buffer.extend_from_slice(&key[shared..]);
        buffer.extend_from_slice(value);

        last_key = key.clone();
        counter += 1;
    }

    for point in &restarts {
        buffer.extend_from_slice(&point.to_le_bytes());
    }
    buffer.extend_from_slice(&(restarts.len() as u32).to_le_bytes());

    buffer
}

/// Compresses a payload, appends it with its trailer (tag + CRC32C over
/// payload and tag), and returns its handle.
fn append_block(file: &mut Vec<u8>, payload: &[u8], compression: Compression) -> BlockHandle {
    let stored = compress::compress(payload, compression).unwrap();
    let offset = file.len() as u64;

    file.extend_from_slice(&stored);
    file.push(compression.to_u8());
    let crc = crc32c::crc32c(&file[offset as usize..]);
    file.extend_from_slice(&crc.to_le_bytes());

    BlockHandle::new(offset, stored.len() as u32)
}

fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
    out
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let min_len = a.len().min(b.len());
    for i in 0..min_len {
        if a[i] != b[i] {
            return i;
        }
    }
    min_len
}
