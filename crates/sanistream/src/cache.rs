//! Chunked byte queue with zero-copy reads.
//!
//! Overview
//! - `ChunkedCache` is a single-producer/single-consumer byte queue made of
//!   fixed blocks. The producer asks for a writable slice, fills some prefix
//!   of it, and `commit`s the count. The consumer looks at the readable slice
//!   of the oldest block and `report_read`s what it used.
//! - Blocks live in a `Vec` arena and link to each other by index. Drained
//!   blocks go to a free list and are handed out again before anything new is
//!   allocated, so steady-state streaming allocates nothing.
//!
//! Invariants
//! - `offset + length <= buffer.len()` for every block.
//! - The cache length is the sum of the linked block lengths, and
//!   `head.is_none() <=> len() == 0`. A block handed out by
//!   `writable_slice` is only linked on its first non-empty `commit`.

use tracing::trace;

/// Smallest block the cache allocates.
pub const MIN_BLOCK_SIZE: usize = 2048;
/// Block sizes are rounded up to a multiple of this.
pub const BLOCK_ROUNDING: usize = 1024;
/// Tail blocks holding at most this many unread bytes may be compacted in
/// place instead of linking a new block.
pub const COMPACT_THRESHOLD: usize = 64;

#[derive(Debug, Default)]
struct Block {
    buffer: Vec<u8>,
    offset: usize,
    length: usize,
    next: Option<usize>,
}

impl Block {
    fn free_space(&self) -> usize {
        self.buffer.len() - self.offset - self.length
    }

    fn clear(&mut self) {
        self.offset = 0;
        self.length = 0;
    }
}

fn block_size(min_size: usize) -> usize {
    MIN_BLOCK_SIZE
        .max(min_size.saturating_mul(2))
        .next_multiple_of(BLOCK_ROUNDING)
}

/// A queue of bytes stored in a linked list of reusable blocks.
///
/// ```rust
/// use sanistream::ChunkedCache;
///
/// let mut cache = ChunkedCache::new();
/// let room = cache.writable_slice(5);
/// room[..5].copy_from_slice(b"hello");
/// cache.commit(5);
///
/// assert_eq!(cache.readable_slice(), b"hello");
/// cache.report_read(5);
/// assert!(cache.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ChunkedCache {
    blocks: Vec<Block>,
    head: Option<usize>,
    tail: Option<usize>,
    /// Block handed out by `writable_slice` that is not linked yet.
    spare: Option<usize>,
    /// Block the last `writable_slice` call pointed into.
    writing: Option<usize>,
    free: Option<usize>,
    length: usize,
}

impl ChunkedCache {
    /// Creates an empty cache. No memory is allocated until the first write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` when no unread bytes remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns at least `min_size` bytes of writable space.
    ///
    /// The space is only part of the queue once [`commit`](Self::commit) is
    /// called. Calling `writable_slice` again before committing discards the
    /// previous slice.
    pub fn writable_slice(&mut self, min_size: usize) -> &mut [u8] {
        let min_size = min_size.max(1);
        let index = self.writable_block(min_size);
        self.writing = Some(index);
        let block = &mut self.blocks[index];
        let start = block.offset + block.length;
        &mut block.buffer[start..]
    }

    fn writable_block(&mut self, min_size: usize) -> usize {
        if let Some(tail) = self.tail {
            let block = &mut self.blocks[tail];
            if block.free_space() < min_size
                && block.offset > 0
                && block.length <= COMPACT_THRESHOLD
                && block.buffer.len() - block.length >= min_size
            {
                trace!(unread = block.length, "compacting cache tail");
                block
                    .buffer
                    .copy_within(block.offset..block.offset + block.length, 0);
                block.offset = 0;
            }
            if block.free_space() >= min_size {
                return tail;
            }
        }

        if let Some(spare) = self.spare {
            let block = &mut self.blocks[spare];
            let size = block_size(min_size);
            if block.buffer.len() < size {
                block.buffer.resize(size, 0);
            }
            return spare;
        }

        let index = self.allocate(block_size(min_size));
        self.spare = Some(index);
        index
    }

    fn allocate(&mut self, size: usize) -> usize {
        if let Some(index) = self.free {
            let block = &mut self.blocks[index];
            self.free = block.next.take();
            block.clear();
            if block.buffer.len() < size {
                block.buffer.resize(size, 0);
            }
            index
        } else {
            trace!(size, blocks = self.blocks.len() + 1, "allocating cache block");
            self.blocks.push(Block {
                buffer: vec![0; size],
                ..Block::default()
            });
            self.blocks.len() - 1
        }
    }

    /// Appends `count` bytes from the slice returned by the last
    /// [`writable_slice`](Self::writable_slice) call.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds that slice, or if no slice was handed out.
    pub fn commit(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let index = self
            .writing
            .expect("commit called without a writable slice");
        assert!(
            count <= self.blocks[index].free_space(),
            "commit exceeds the writable slice"
        );

        if self.spare == Some(index) {
            self.spare = None;
            match self.tail {
                Some(tail) => self.blocks[tail].next = Some(index),
                None => self.head = Some(index),
            }
            self.tail = Some(index);
        }

        self.blocks[index].length += count;
        self.length += count;
    }

    /// The unread bytes of the oldest block. Empty when the cache is empty.
    ///
    /// The slice may be shorter than [`len`](Self::len) when the data spans
    /// several blocks.
    #[must_use]
    pub fn readable_slice(&self) -> &[u8] {
        match self.head {
            Some(head) => {
                let block = &self.blocks[head];
                &block.buffer[block.offset..block.offset + block.length]
            }
            None => &[],
        }
    }

    /// Marks `count` bytes of the current readable slice as consumed.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the current readable slice.
    pub fn report_read(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let head = self.head.expect("report_read on an empty cache");
        let block = &mut self.blocks[head];
        assert!(count <= block.length, "report_read past the readable slice");

        block.offset += count;
        block.length -= count;
        self.length -= count;

        if block.length == 0 {
            let next = block.next.take();
            block.clear();
            block.next = self.free;
            self.free = Some(head);
            self.head = next;
            if self.writing == Some(head) {
                self.writing = None;
            }
            if self.tail == Some(head) {
                assert_eq!(self.length, 0, "cache length out of sync with its blocks");
                self.tail = None;
            }
        }
    }

    /// Appends all of `data`.
    pub fn write(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = self.writable_slice(data.len().min(MIN_BLOCK_SIZE));
            let n = room.len().min(data.len());
            room[..n].copy_from_slice(&data[..n]);
            self.commit(n);
            data = &data[n..];
        }
    }

    /// Moves up to `out.len()` bytes out of the cache, returning the count.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() && !self.is_empty() {
            let chunk = self.readable_slice();
            let n = chunk.len().min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&chunk[..n]);
            self.report_read(n);
            copied += n;
        }
        copied
    }

    /// Drops all unread data and returns every block to the free list.
    pub fn reset(&mut self) {
        let count = self.blocks.len();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.clear();
            block.next = (i + 1 < count).then_some(i + 1);
        }
        self.free = (count > 0).then_some(0);
        self.head = None;
        self.tail = None;
        self.spare = None;
        self.writing = None;
        self.length = 0;
    }

    #[cfg(any(test, feature = "fuzzing"))]
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        let mut total = 0;
        let mut cursor = self.head;
        let mut last = None;
        while let Some(index) = cursor {
            let block = &self.blocks[index];
            assert!(block.offset + block.length <= block.buffer.len());
            assert!(block.length > 0, "linked block is empty");
            total += block.length;
            last = Some(index);
            cursor = block.next;
        }
        assert_eq!(total, self.length);
        assert_eq!(last, self.tail);
        assert_eq!(self.head.is_none(), self.length == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_write_then_read_restores_empty_state() {
        let mut cache = ChunkedCache::new();
        let room = cache.writable_slice(100);
        assert!(room.len() >= 100);
        for (i, b) in room[..100].iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        cache.commit(100);
        cache.check_invariants();

        let readable = cache.readable_slice();
        assert_eq!(readable.len(), 100);
        assert_eq!(readable[99], 99);

        cache.report_read(100);
        assert_eq!(cache.len(), 0);
        assert!(cache.head.is_none());
        assert!(cache.tail.is_none());
        cache.check_invariants();
    }

    #[test]
    fn uncommitted_slice_is_not_visible() {
        let mut cache = ChunkedCache::new();
        let _ = cache.writable_slice(10);
        assert!(cache.is_empty());
        assert!(cache.readable_slice().is_empty());
        cache.check_invariants();
    }

    #[test]
    fn block_sizes_round_to_kib() {
        assert_eq!(block_size(1), 2048);
        assert_eq!(block_size(1500), 3072);
        assert_eq!(block_size(2048), 4096);
    }

    #[test]
    fn data_spanning_blocks_reads_back_in_order() {
        let mut cache = ChunkedCache::new();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        for chunk in payload.chunks(777) {
            cache.write(chunk);
            cache.check_invariants();
        }
        assert_eq!(cache.len(), payload.len());

        let mut out = vec![0; payload.len()];
        let mut read = 0;
        while read < out.len() {
            let n = cache.read(&mut out[read..(read + 333).min(payload.len())]);
            assert!(n > 0);
            read += n;
            cache.check_invariants();
        }
        assert_eq!(out, payload);
        assert!(cache.is_empty());
    }

    #[test]
    fn drained_blocks_are_reused() {
        let mut cache = ChunkedCache::new();
        for _ in 0..16 {
            cache.write(&[7; 3000]);
            let mut sink = [0; 3000];
            assert_eq!(cache.read(&mut sink), 3000);
        }
        assert!(cache.blocks.len() <= 2, "allocated {} blocks", cache.blocks.len());
    }

    #[test]
    fn small_tail_is_compacted_instead_of_linking() {
        let mut cache = ChunkedCache::new();
        cache.write(&[1; 2040]);
        cache.report_read(2000);
        // 40 unread bytes at offset 2000, 8 free bytes at the end.
        let room = cache.writable_slice(100);
        assert!(room.len() >= 100);
        assert_eq!(cache.blocks.len(), 1);
        assert_eq!(cache.readable_slice(), &[1; 40]);
        cache.check_invariants();
    }

    #[test]
    fn reset_recycles_everything() {
        let mut cache = ChunkedCache::new();
        cache.write(&[1; 5000]);
        cache.reset();
        assert!(cache.is_empty());
        cache.check_invariants();
        let blocks = cache.blocks.len();
        cache.write(&[2; 100]);
        assert_eq!(cache.blocks.len(), blocks);
        assert_eq!(cache.readable_slice(), &[2; 100]);
    }

    #[test]
    #[should_panic(expected = "commit exceeds the writable slice")]
    fn overcommit_panics() {
        let mut cache = ChunkedCache::new();
        let len = cache.writable_slice(1).len();
        cache.commit(len + 1);
    }
}
