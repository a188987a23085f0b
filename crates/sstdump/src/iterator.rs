//! Table-wide iteration: one cursor spanning every data block.
//!
//! # State machine
//!
//! ```text
//!            seek_to_first / seek
//!  ┌─────────┐        ┌─────────────────────┐
//!  │ AtStart │ ─────→ │ Valid(block cursor) │ ⟲ next
//!  └─────────┘        └─────────────────────┘
//!        │                │            │
//!        │   empty table  │ exhausted  │ decode failure
//!        │                ↓            ↓
//!        │          ┌─────────┐   ┌──────────────┐
//!        └────────→ │  AtEnd  │   │ Error(latch) │
//!                   └─────────┘   └──────────────┘
//! ```
//!
//! A decode failure latches: every later call returns the same error
//! without touching the file again. Corrupt blocks are never skipped.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::block::BlockIterator;
use crate::error::{Result, SstError};
use crate::reader::SstReader;

enum State {
    /// Fresh iterator, not yet positioned.
    AtStart,
    /// Positioned on an entry of the data block at `index_pos`.
    Valid {
        index_pos: usize,
        block: BlockIterator,
    },
    /// Ran off the end of the table (or the table is empty).
    AtEnd,
    /// A decode failed; the error is replayed on every later call.
    Error(SstError),
}

/// Cursor over every entry of an [`SstReader`], in comparator order.
///
/// Data blocks are decoded lazily as the cursor reaches them. Each iterator
/// is owned by a single task; share the reader, not the iterator.
pub struct SstIterator {
    reader: Arc<SstReader>,
    state: State,
    /// Last key yielded, kept to verify the table-wide ordering invariant.
    last_key: Vec<u8>,
    have_last: bool,
}

impl SstIterator {
    pub(crate) fn new(reader: Arc<SstReader>) -> Self {
        Self {
            reader,
            state: State::AtStart,
            last_key: Vec::new(),
            have_last: false,
        }
    }

    /// True when the cursor points at an entry.
    pub fn valid(&self) -> bool {
        matches!(self.state, State::Valid { .. })
    }

    /// The latched error, if a previous call failed.
    pub fn status(&self) -> Result<()> {
        match &self.state {
            State::Error(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    /// Current key.
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn key(&self) -> &[u8] {
        match &self.state {
            State::Valid { block, .. } => block.key(),
            _ => panic!("key() called on invalid table iterator"),
        }
    }

    /// Current value.
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn value(&self) -> &[u8] {
        match &self.state {
            State::Valid { block, .. } => block.value(),
            _ => panic!("value() called on invalid table iterator"),
        }
    }

    /// Positions at the first entry of the table; `AtEnd` (not an error)
    /// when the table is empty.
    pub async fn seek_to_first(&mut self) -> Result<()> {
        if let State::Error(e) = &self.state {
            return Err(e.clone());
        }
        self.have_last = false;
        self.open_from(0, None).await
    }

    /// Positions at the first entry whose key is >= `target`, crossing
    /// block boundaries as needed; `AtEnd` when no such entry exists.
    pub async fn seek(&mut self, target: &[u8]) -> Result<()> {
        if let State::Error(e) = &self.state {
            return Err(e.clone());
        }
        self.have_last = false;

        match self.reader.index().seek(self.reader.comparator(), target) {
            None => {
                self.state = State::AtEnd;
                Ok(())
            }
            Some(pos) => self.open_from(pos, Some(target)).await,
        }
    }

    /// Advances one entry, lazily opening the next data block when the
    /// current one is exhausted. Fails closed at the end of the table.
    ///
    /// # Panics
    /// Panics if called before the iterator was ever positioned.
    pub async fn next(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::AtEnd) {
            State::Error(e) => {
                self.state = State::Error(e.clone());
                Err(e)
            }
            State::AtEnd => Ok(()),
            State::AtStart => panic!("next() called on unpositioned table iterator"),
            State::Valid {
                index_pos,
                mut block,
            } => {
                if let Err(e) = block.next() {
                    let e = self.latch(e, index_pos);
                    return Err(e);
                }
                if block.valid() {
                    self.state = State::Valid { index_pos, block };
                    self.note_current_key()
                } else {
                    self.open_from(index_pos + 1, None).await
                }
            }
        }
    }

    /// Pull-style convenience: drives the cursor from wherever it is and
    /// yields the next entry, or `None` once the table is exhausted.
    ///
    /// Starting from a fresh iterator this walks the whole table; after an
    /// explicit `seek` it yields the entry *after* the seek target's.
    pub async fn try_next(&mut self) -> Result<Option<(Bytes, Bytes)>> {
        match &self.state {
            State::AtStart => self.seek_to_first().await?,
            State::Valid { .. } => self.next().await?,
            State::AtEnd => return Ok(None),
            State::Error(e) => return Err(e.clone()),
        }

        match &self.state {
            State::Valid { block, .. } => Ok(Some((
                Bytes::copy_from_slice(block.key()),
                block.value_bytes(),
            ))),
            _ => Ok(None),
        }
    }

    /// Opens data blocks starting at `index_pos` until one yields an entry.
    ///
    /// The seek target only applies to the first block (it is the only one
    /// that can contain it); later blocks start from their first entry.
    async fn open_from(&mut self, mut index_pos: usize, seek_target: Option<&[u8]>) -> Result<()> {
        let mut target = seek_target;
        loop {
            let handle = match self.reader.index().get(index_pos) {
                Some(entry) => entry.handle,
                None => {
                    self.state = State::AtEnd;
                    return Ok(());
                }
            };

            let block = match self.reader.read_block(handle).await {
                Ok(block) => block,
                Err(e) => {
                    self.state = State::Error(e.clone());
                    return Err(e);
                }
            };

            let mut iter = block.iter(self.reader.comparator_handle());
            let positioned = match target {
                Some(key) => iter.seek(key),
                None => iter.seek_to_first(),
            };
            if let Err(e) = positioned {
                let e = self.latch(e, index_pos);
                return Err(e);
            }

            if iter.valid() {
                self.state = State::Valid {
                    index_pos,
                    block: iter,
                };
                return self.note_current_key();
            }

            // Empty block, or the only candidate block ended before the
            // target; move on to the next block's first entry.
            index_pos += 1;
            target = None;
        }
    }

    /// Verifies the strictly-increasing key invariant against the last
    /// yielded key and records the current one.
    fn note_current_key(&mut self) -> Result<()> {
        let key = match &self.state {
            State::Valid { block, .. } => block.key().to_vec(),
            _ => return Ok(()),
        };

        if self.have_last
            && self
                .reader
                .comparator()
                .compare(&key, &self.last_key)
                != Ordering::Greater
        {
            let err = SstError::MalformedRecord(format!(
                "keys out of order: {:02x?} does not follow {:02x?}",
                key, self.last_key
            ));
            self.state = State::Error(err.clone());
            return Err(err);
        }

        self.last_key = key;
        self.have_last = true;
        Ok(())
    }

    /// Latches a block-level error with its file offset attached.
    fn latch(&mut self, err: SstError, index_pos: usize) -> SstError {
        let err = match self.reader.index().get(index_pos) {
            Some(entry) => err.with_block_offset(entry.handle.offset),
            None => err,
        };
        self.state = State::Error(err.clone());
        err
    }
}
