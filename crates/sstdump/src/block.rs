//! Decoded blocks and in-block iteration with restart points.
//!
//! Block payload structure (after trailer stripping and decompression):
//! ```text
//! [Records with prefix compression]
//! [Restart points array: u32...]
//! [Restart count: u32]
//! ```
//!
//! Record format:
//! - shared_len: varint (bytes shared with the previous key)
//! - unshared_len: varint (bytes not shared)
//! - value_len: varint
//! - key_suffix: bytes[unshared_len]
//! - value: bytes[value_len]
//!
//! A restart point is a record that stores its full key (`shared_len == 0`).
//! Restart points make seeks O(log R + k): binary search over the restart
//! array, then a short linear decode to the target.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::comparator::Comparator;
use crate::error::{Result, SstError};
use crate::format::decode_varint;

/// Decoded logical content of one physical block.
///
/// Cheap to clone: the payload is a shared [`Bytes`] buffer. A block may be
/// cached by the reader and handed to any number of iterators.
#[derive(Debug, Clone)]
pub struct Block {
    data: Bytes,
    restarts: Vec<u32>,
    data_end: usize,
}

impl Block {
    /// Parses the restart array from a decompressed, checksum-verified
    /// payload.
    pub fn decode(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(SstError::MalformedRecord(
                "block shorter than its restart count".to_string(),
            ));
        }

        let mut tail = &data[data.len() - 4..];
        let restart_count = tail.get_u32_le() as usize;

        let restart_bytes = restart_count
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .ok_or_else(|| {
                SstError::MalformedRecord(format!("restart count {restart_count} overflows"))
            })?;
        if data.len() < restart_bytes {
            return Err(SstError::MalformedRecord(format!(
                "restart array of {restart_count} entries overruns block of {} bytes",
                data.len()
            )));
        }

        let data_end = data.len() - restart_bytes;
        if restart_count == 0 && data_end != 0 {
            return Err(SstError::MalformedRecord(
                "non-empty block with no restart points".to_string(),
            ));
        }

        let mut restarts = Vec::with_capacity(restart_count);
        let mut cur = &data[data_end..data.len() - 4];
        let mut prev = 0u32;
        for _ in 0..restart_count {
            let point = cur.get_u32_le();
            if point as usize > data_end || point < prev {
                return Err(SstError::MalformedRecord(format!(
                    "restart point {point} out of range (record region is {data_end} bytes)"
                )));
            }
            prev = point;
            restarts.push(point);
        }

        Ok(Block {
            data,
            restarts,
            data_end,
        })
    }

    /// True when the block holds no records.
    pub fn is_empty(&self) -> bool {
        self.data_end == 0
    }

    /// Number of restart points.
    pub fn restart_count(&self) -> usize {
        self.restarts.len()
    }

    /// Returns a positional iterator over this block's records.
    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIterator {
        BlockIterator {
            data: self.data.clone(),
            restarts: self.restarts.clone(),
            data_end: self.data_end,
            comparator,
            current: self.data_end,
            next_offset: 0,
            restart_index: 0,
            key: Vec::new(),
            value: Bytes::new(),
            valid: false,
        }
    }
}

/// Cursor over one decoded block.
///
/// `key()`/`value()` may only be called while `valid()` returns true;
/// calling them on an invalid cursor is a caller bug and panics.
pub struct BlockIterator {
    data: Bytes,
    restarts: Vec<u32>,
    data_end: usize,
    comparator: Arc<dyn Comparator>,
    /// Offset of the current record; `data_end` when not positioned.
    current: usize,
    /// Offset where the next record begins.
    next_offset: usize,
    /// Restart region containing the current record.
    restart_index: usize,
    key: Vec<u8>,
    value: Bytes,
    valid: bool,
}

impl BlockIterator {
    /// True when the cursor points at a record.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Current key.
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "key() called on invalid block iterator");
        &self.key
    }

    /// Current value.
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "value() called on invalid block iterator");
        &self.value
    }

    /// Current value as a shared slice of the block payload.
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn value_bytes(&self) -> Bytes {
        assert!(self.valid, "value_bytes() called on invalid block iterator");
        self.value.clone()
    }

    /// Positions at the first record; invalid if the block is empty.
    pub fn seek_to_first(&mut self) -> Result<()> {
        if self.data_end == 0 {
            self.valid = false;
            return Ok(());
        }
        self.seek_to_restart(0);
        self.parse_next().map(|_| ())
    }

    /// Positions at the last record; invalid if the block is empty.
    pub fn seek_to_last(&mut self) -> Result<()> {
        if self.data_end == 0 {
            self.valid = false;
            return Ok(());
        }
        self.seek_to_restart(self.restarts.len() - 1);
        loop {
            if !self.parse_next()? {
                break;
            }
            if self.next_offset >= self.data_end {
                break;
            }
        }
        Ok(())
    }

    /// Positions at the first record whose key is >= `target`; invalid if
    /// every key in the block is smaller.
    ///
    /// Two phases: binary search the restart array for the last restart key
    /// < `target`, then decode forward until the first key >= `target`.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        if self.data_end == 0 {
            self.valid = false;
            return Ok(());
        }

        let mut left = 0usize;
        let mut right = self.restarts.len() - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            let key = self.restart_key(mid)?;
            if self.comparator.compare(key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart(left);
        loop {
            if !self.parse_next()? {
                return Ok(());
            }
            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return Ok(());
            }
        }
    }

    /// Advances one record; fails closed at the end of the block.
    pub fn next(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        self.parse_next().map(|_| ())
    }

    /// Retreats one record; fails closed at the start of the block.
    ///
    /// Prefix compression only links forward, so this re-scans from the
    /// nearest restart point before the current record.
    pub fn prev(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }

        let target = self.current;
        let mut ri = self.restart_index;
        while self.restarts[ri] as usize >= target {
            if ri == 0 {
                // Already at the first record.
                self.valid = false;
                self.current = self.data_end;
                self.key.clear();
                return Ok(());
            }
            ri -= 1;
        }

        self.seek_to_restart(ri);
        loop {
            if !self.parse_next()? {
                return Err(SstError::MalformedRecord(format!(
                    "restart point {} not followed by a record before offset {target}",
                    self.restarts[ri]
                )));
            }
            if self.next_offset >= target {
                return Ok(());
            }
        }
    }

    /// Resets the cursor to decode from restart point `idx`.
    fn seek_to_restart(&mut self, idx: usize) {
        self.restart_index = idx;
        self.next_offset = self.restarts[idx] as usize;
        self.current = self.data_end;
        self.key.clear();
        self.value = Bytes::new();
        self.valid = false;
    }

    /// Decodes the full key stored at restart point `idx`.
    fn restart_key(&self, idx: usize) -> Result<&[u8]> {
        let offset = self.restarts[idx] as usize;
        let mut buf = &self.data[offset..self.data_end];
        let before = buf.len();

        let shared = decode_varint(&mut buf)? as usize;
        let unshared = decode_varint(&mut buf)? as usize;
        let _value_len = decode_varint(&mut buf)?;

        if shared != 0 {
            return Err(SstError::MalformedRecord(format!(
                "restart point at offset {offset} has shared prefix length {shared}"
            )));
        }
        if buf.len() < unshared {
            return Err(SstError::MalformedRecord(format!(
                "restart key at offset {offset} overruns record region"
            )));
        }

        let key_start = offset + (before - buf.len());
        Ok(&self.data[key_start..key_start + unshared])
    }

    /// Decodes the record at `next_offset`, if any.
    ///
    /// Returns `Ok(false)` when the record region is exhausted. On a decode
    /// error the cursor is invalidated before the error is returned.
    fn parse_next(&mut self) -> Result<bool> {
        if self.next_offset >= self.data_end {
            self.current = self.data_end;
            self.valid = false;
            return Ok(false);
        }

        match self.parse_at(self.next_offset) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.valid = false;
                Err(e)
            }
        }
    }

    fn parse_at(&mut self, offset: usize) -> Result<()> {
        let mut buf = &self.data[offset..self.data_end];
        let before = buf.len();

        let shared = decode_varint(&mut buf)? as usize;
        let unshared = decode_varint(&mut buf)? as usize;
        let value_len = decode_varint(&mut buf)? as usize;

        if unshared
            .checked_add(value_len)
            .map_or(true, |n| n > buf.len())
        {
            return Err(SstError::MalformedRecord(format!(
                "record at offset {offset} overruns record region by its encoded lengths"
            )));
        }
        if shared > self.key.len() {
            return Err(SstError::MalformedRecord(format!(
                "record at offset {offset} shares {shared} bytes but previous key has {}",
                self.key.len()
            )));
        }

        let header_len = before - buf.len();
        let value_start = offset + header_len + unshared;

        self.key.truncate(shared);
        self.key.extend_from_slice(&buf[..unshared]);
        self.value = self.data.slice(value_start..value_start + value_len);

        self.current = offset;
        self.next_offset = value_start + value_len;

        while self.restart_index + 1 < self.restarts.len()
            && self.restarts[self.restart_index + 1] as usize <= self.current
        {
            self.restart_index += 1;
        }

        self.valid = true;
        Ok(())
    }
}
