// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The arena command records are written into, and the stream it becomes.
//!
//! Records live in a vector of 8-byte words. Every record starts with a
//! header word packing its tag, the size of one element and the element
//! count, followed by the elements padded up to the next word. Records are
//! addressed by position, never by pointer, so growing the arena cannot
//! invalidate anything.

use super::record::{Command, CommandTag};
use crate::error::{AllocError, CommandBufferError};
use bytemuck::Pod;
use std::mem::{align_of, size_of};

const WORD_BYTES: usize = size_of::<u64>();

fn encode_header(tag: CommandTag, element_size: u16, count: u32) -> u64 {
    u64::from(tag as u16) | u64::from(element_size) << 16 | u64::from(count) << 32
}

fn decode_header(header: u64) -> (u16, u16, u32) {
    (header as u16, (header >> 16) as u16, (header >> 32) as u32)
}

/// An append-only arena of tagged command records.
#[derive(Debug)]
pub struct CommandAllocator {
    words: Vec<u64>,
    records: usize,
    limit_bytes: usize,
}

impl CommandAllocator {
    /// Creates an empty allocator that refuses to grow past `limit_bytes`.
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            words: Vec::new(),
            records: 0,
            limit_bytes,
        }
    }

    /// Appends a record of `count` elements of type `T` and returns the
    /// zeroed elements for the caller to fill.
    pub fn allocate<T: Pod>(
        &mut self,
        tag: CommandTag,
        count: usize,
    ) -> Result<&mut [T], AllocError> {
        const {
            assert!(align_of::<T>() <= WORD_BYTES);
            assert!(size_of::<T>() > 0);
        }

        let too_large = AllocError::RecordTooLarge {
            count,
            element_size: size_of::<T>(),
        };
        let element_size = u16::try_from(size_of::<T>()).map_err(|_| too_large.clone())?;
        let count32 = u32::try_from(count).map_err(|_| too_large.clone())?;
        let payload_bytes = size_of::<T>().checked_mul(count).ok_or(too_large)?;
        let record_words = 1 + payload_bytes.div_ceil(WORD_BYTES);

        let start = self.words.len();
        let requested = (start + record_words).saturating_mul(WORD_BYTES);
        if requested > self.limit_bytes {
            return Err(AllocError::LimitExceeded {
                requested,
                limit: self.limit_bytes,
            });
        }
        self.words
            .try_reserve(record_words)
            .map_err(|_| AllocError::OutOfMemory { requested })?;

        self.words.push(encode_header(tag, element_size, count32));
        self.words.resize(start + record_words, 0);
        self.records += 1;

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words[start + 1..]);
        Ok(bytemuck::cast_slice_mut(&mut bytes[..payload_bytes]))
    }

    /// Appends a record holding a copy of `values`.
    pub fn write<T: Pod>(&mut self, tag: CommandTag, values: &[T]) -> Result<(), AllocError> {
        self.allocate::<T>(tag, values.len())?
            .copy_from_slice(values);
        Ok(())
    }

    /// The number of records written so far.
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// The number of bytes used so far.
    pub fn byte_len(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    /// Hands the records over to a [`CommandStream`]. The allocator is consumed,
    /// so nothing can be written after this point.
    pub fn acquire(self) -> CommandStream {
        log::trace!(
            "Acquired command stream: {} records, {} bytes",
            self.records,
            self.byte_len()
        );
        CommandStream {
            words: self.words.into_boxed_slice(),
            records: self.records,
        }
    }
}

/// An immutable sequence of command records, ready for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStream {
    words: Box<[u64]>,
    records: usize,
}

impl CommandStream {
    /// The number of records in the stream.
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Returns `true` if the stream holds no record.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// The encoded stream.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Walks the raw records in recording order.
    pub fn records(&self) -> RecordIter<'_> {
        RecordIter {
            words: &self.words,
            cursor: 0,
            index: 0,
        }
    }

    /// Walks the decoded commands in recording order. Iteration stops after
    /// the first malformed record.
    pub fn commands(&self) -> Commands<'_> {
        Commands {
            records: self.records(),
            done: false,
        }
    }
}

/// A record as stored in a stream.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    /// The position of the record in the stream.
    pub index: usize,
    /// The tag of the record.
    pub tag: CommandTag,
    /// The number of elements in the record.
    pub count: usize,
    element_size: usize,
    bytes: &'a [u8],
}

impl<'a> RawRecord<'a> {
    /// Views the elements as `T`. Returns `None` if `T` does not have the
    /// element size the record was written with.
    pub fn payload<T: Pod>(&self) -> Option<&'a [T]> {
        if self.element_size != size_of::<T>() {
            return None;
        }
        bytemuck::try_cast_slice(self.bytes).ok()
    }
}

/// An iterator over the raw records of a [`CommandStream`].
#[derive(Debug, Clone)]
pub struct RecordIter<'a> {
    words: &'a [u64],
    cursor: usize,
    index: usize,
}

impl RecordIter<'_> {
    fn malformed(&mut self) -> CommandBufferError {
        self.cursor = self.words.len();
        CommandBufferError::MalformedStream { record: self.index }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<RawRecord<'a>, CommandBufferError>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = *self.words.get(self.cursor)?;
        let (raw_tag, element_size, count) = decode_header(header);
        let Some(tag) = CommandTag::from_raw(raw_tag) else {
            return Some(Err(self.malformed()));
        };

        let payload_bytes = usize::from(element_size) * count as usize;
        let payload_start = self.cursor + 1;
        let payload_end = payload_start + payload_bytes.div_ceil(WORD_BYTES);
        let Some(words) = self.words.get(payload_start..payload_end) else {
            return Some(Err(self.malformed()));
        };

        let record = RawRecord {
            index: self.index,
            tag,
            count: count as usize,
            element_size: usize::from(element_size),
            bytes: &bytemuck::cast_slice(words)[..payload_bytes],
        };
        self.cursor = payload_end;
        self.index += 1;
        Some(Ok(record))
    }
}

/// An iterator over the decoded commands of a [`CommandStream`].
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    records: RecordIter<'a>,
    done: bool,
}

impl Iterator for Commands<'_> {
    type Item = Result<Command, CommandBufferError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.records.next()? {
            Ok(record) => Command::decode(record, &mut self.records),
            Err(err) => Err(err),
        };
        self.done = item.is_err();
        Some(item)
    }
}
