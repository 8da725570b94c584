use std::io;
use std::sync::Arc;

use super::layout::Storage;
use super::Buffer::{FifoCounters, OverflowPolicy, RingBuffer};
use crate::Core::{Counter, SharedMemoryBackend};
use crate::FIFO::Structs::FifoStats;

impl RingBuffer {
    /// A FIFO of `capacity` bytes over its own heap block.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: u32) -> io::Result<Self> {
        assert!(capacity > 0, "FIFO capacity must be non-zero");
        let storage = Storage::owned(capacity as usize)?;
        Ok(Self::from_storage(storage, capacity, OverflowPolicy::default(), 0))
    }

    /// A FIFO over `[offset, offset + capacity)` of an existing region.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn with_region(
        region: Arc<dyn SharedMemoryBackend>,
        offset: usize,
        capacity: u32,
    ) -> io::Result<Self> {
        assert!(capacity > 0, "FIFO capacity must be non-zero");
        let storage = Storage::carve(region, offset, capacity as usize)?;
        Ok(Self::from_storage(storage, capacity, OverflowPolicy::default(), 0))
    }

    pub(crate) fn from_storage(
        storage: Storage,
        capacity: u32,
        policy: OverflowPolicy,
        id: u16,
    ) -> Self {
        debug_assert!(storage.len() >= capacity as usize);
        Self {
            counters: FifoCounters::default(),
            lock: parking_lot::const_mutex(()),
            storage,
            capacity,
            policy,
            id,
        }
    }

    /// Bytes a reader can take right now.
    #[inline]
    pub fn readable_length(&self) -> u32 {
        self.counters.size.load()
    }

    /// Bytes a writer could reserve right now.
    pub fn free_length(&self) -> u32 {
        let _guard = self.lock.lock();
        self.free_locked()
    }

    #[inline]
    fn free_locked(&self) -> u32 {
        let used = Counter::load_sum(&self.counters.size, &self.counters.wr_size);
        self.capacity.saturating_sub(used)
    }

    /// Append `data` with this FIFO's configured overflow policy.
    pub fn write(&self, data: &[u8]) -> u32 {
        self.insert_with(data, self.policy)
    }

    /// Append `data` whole or not at all. Returns `data.len()` or 0.
    pub fn insert(&self, data: &[u8]) -> u32 {
        self.insert_with(data, OverflowPolicy::RejectOnFull)
    }

    /// Append `data`, evicting the oldest unread bytes if there is no room.
    ///
    /// Still rejects (returns 0) while a read is in progress, or when
    /// in-flight writers leave too little room even after eviction.
    pub fn insert_overwrite(&self, data: &[u8]) -> u32 {
        self.insert_with(data, OverflowPolicy::EvictOldestOnFull)
    }

    pub fn insert_with(&self, data: &[u8], policy: OverflowPolicy) -> u32 {
        let Ok(len) = u32::try_from(data.len()) else {
            self.counters.overflow.saturating_inc();
            return 0;
        };
        if len == 0 {
            return 0;
        }
        let Some(start) = self.reserve_write(len, policy) else {
            return 0;
        };
        unsafe { self.storage.write_wrapped(start, self.capacity, data) };
        self.commit_write();
        len
    }

    /// Append the concatenation of `segments` as one all-or-nothing block.
    pub fn insert_batch(&self, segments: &[&[u8]]) -> u32 {
        let total = segments
            .iter()
            .try_fold(0u32, |acc, seg| {
                u32::try_from(seg.len()).ok().and_then(|l| acc.checked_add(l))
            });
        let Some(total) = total else {
            self.counters.overflow.saturating_inc();
            return 0;
        };
        if total == 0 {
            return 0;
        }
        let Some(mut cursor) = self.reserve_write(total, OverflowPolicy::RejectOnFull) else {
            return 0;
        };
        for seg in segments {
            unsafe { self.storage.write_wrapped(cursor, self.capacity, seg) };
            let step = seg.len() as u32;
            let room = self.capacity - cursor;
            cursor = if step >= room { step - room } else { cursor + step };
        }
        self.commit_write();
        total
    }

    /// Claim `len` bytes of space without filling them.
    ///
    /// The bytes become readable with whatever the band held before.
    pub fn reserve(&self, len: u32) -> u32 {
        if len == 0 {
            return 0;
        }
        if self.reserve_write(len, OverflowPolicy::RejectOnFull).is_none() {
            return 0;
        }
        self.commit_write();
        len
    }

    /// Take up to `out.len()` bytes. Returns how many were copied; 0 when
    /// empty or when another read is already in progress.
    pub fn extract(&self, out: &mut [u8]) -> u32 {
        let want = u32::try_from(out.len()).unwrap_or(u32::MAX);
        let Some((start, len)) = self.reserve_read(want) else {
            return 0;
        };
        unsafe {
            self.storage
                .read_wrapped(start, self.capacity, &mut out[..len as usize])
        };
        self.release_read(len);
        len
    }

    /// Drop up to `len` bytes without copying them out.
    pub fn discard(&self, len: u32) -> u32 {
        let Some((_, len)) = self.reserve_read(len) else {
            return 0;
        };
        self.release_read(len);
        len
    }

    /// Publish `data` as the box's latest value. Returns `data.len()`, or 0
    /// if another box write is in progress or the value exceeds half the
    /// capacity.
    pub fn box_insert(&self, data: &[u8]) -> u32 {
        let half = self.capacity / 2;
        let len = match u32::try_from(data.len()) {
            Ok(0) => return 0,
            Ok(len) if len <= half => len,
            _ => {
                self.counters.overflow.saturating_inc();
                return 0;
            }
        };
        let c = &self.counters;

        let read_half = {
            let _guard = self.lock.lock();
            if c.wr_cnt.store(1) != 0 {
                // write is in progress
                return 0;
            }
            c.rd_idx.load()
        };
        let start = if read_half < half { half } else { 0 };

        unsafe { self.storage.write_at(start as usize, data) };

        let _guard = self.lock.lock();
        // Any non-zero value marks "fresh value not yet picked up".
        c.wr_size.store(len);
        c.size.store(len);
        c.wr_cnt.store(0);
        len
    }

    /// Copy the box's latest value (exactly `element_size` bytes) into `out`.
    ///
    /// Returns 0 until something has been published. Repeated reads without
    /// an intervening `box_insert` return the same bytes.
    pub fn box_extract(&self, out: &mut [u8], element_size: u32) -> u32 {
        let half = self.capacity / 2;
        let len = element_size;
        if len == 0 || len > half || out.len() < len as usize {
            return 0;
        }
        let c = &self.counters;

        let start = {
            let _guard = self.lock.lock();
            if c.size.load() < len {
                // no data written yet
                return 0;
            }
            let first_reader = c.rd_size.add(len) == 0;
            if first_reader && c.wr_cnt.load() == 0 && c.wr_size.store(0) != 0 {
                let prev = c.rd_idx.fetch_add_wrapping(half, 2 * half);
                if prev < half {
                    half
                } else {
                    0
                }
            } else {
                c.rd_idx.load()
            }
        };

        unsafe {
            self.storage
                .read_at(start as usize, &mut out[..len as usize])
        };

        let _guard = self.lock.lock();
        c.rd_size.sub(len);
        len
    }

    /// Empty the FIFO. Refuses (returns `false`) while any read or write is
    /// in flight. The overflow counter is kept.
    pub fn reset(&self) -> bool {
        let c = &self.counters;
        let _guard = self.lock.lock();
        if c.wr_cnt.load() != 0 || c.rd_size.load() != 0 {
            return false;
        }
        c.size.store(0);
        c.wr_size.store(0);
        c.wr_idx.store(0);
        c.rd_idx.store(0);
        true
    }

    /// Snapshot of every counter.
    pub fn stats(&self) -> FifoStats {
        let c = &self.counters;
        let _guard = self.lock.lock();
        FifoStats {
            capacity: self.capacity,
            committed_size: c.size.load(),
            write_cursor: c.wr_idx.load(),
            read_cursor: c.rd_idx.load(),
            inflight_write_count: c.wr_cnt.load(),
            inflight_write_bytes: c.wr_size.load(),
            inflight_read_bytes: c.rd_size.load(),
            overflow_count: c.overflow.load(),
        }
    }

    // Reservation steps. Each takes the lock for its counter updates only.

    /// Returns the start offset of a `len`-byte write region, or `None` if
    /// the write is rejected.
    fn reserve_write(&self, len: u32, policy: OverflowPolicy) -> Option<u32> {
        let c = &self.counters;
        let _guard = self.lock.lock();

        let free = self.free_locked();
        if len <= free {
            return Some(self.claim_write(len));
        }

        let evict = match policy {
            OverflowPolicy::RejectOnFull => None,
            OverflowPolicy::EvictOldestOnFull => self.eviction_for(len, free),
        };
        let Some(evict) = evict else {
            c.overflow.saturating_inc();
            return None;
        };

        let start = self.claim_write(len);
        // The reader skips over the evicted bytes.
        c.size.sub(evict);
        c.rd_idx.fetch_add_wrapping(evict, self.capacity);
        Some(start)
    }

    /// How many committed bytes must go for `len` to fit, or `None` if
    /// eviction is not allowed right now. Lock held.
    fn eviction_for(&self, len: u32, free: u32) -> Option<u32> {
        let c = &self.counters;
        if c.rd_size.load() != 0 {
            // never evict data a reader is consuming
            return None;
        }
        // Bytes reserved by other writers cannot be evicted.
        if len > self.capacity.saturating_sub(c.wr_size.load()) {
            return None;
        }
        Some(len - free)
    }

    /// Lock held; `len` already known to fit.
    #[inline]
    fn claim_write(&self, len: u32) -> u32 {
        let c = &self.counters;
        c.wr_cnt.add(1);
        c.wr_size.add(len);
        c.wr_idx.fetch_add_wrapping(len, self.capacity)
    }

    /// Drop this writer's reservation; the last writer out publishes.
    fn commit_write(&self) {
        let c = &self.counters;
        let _guard = self.lock.lock();
        if c.wr_cnt.sub(1) == 1 {
            let pending = c.wr_size.store(0);
            c.size.add(pending);
        }
    }

    pub(crate) fn reserve_read(&self, want: u32) -> Option<(u32, u32)> {
        let c = &self.counters;
        let _guard = self.lock.lock();

        let len = want.min(c.size.load());
        if len == 0 {
            return None;
        }
        if c.rd_size.add(len) != 0 {
            // another read is in progress
            c.rd_size.sub(len);
            return None;
        }
        let start = c.rd_idx.fetch_add_wrapping(len, self.capacity);
        Some((start, len))
    }

    pub(crate) fn release_read(&self, len: u32) {
        let c = &self.counters;
        let _guard = self.lock.lock();
        c.size.sub(len);
        c.rd_size.sub(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fifo(capacity: u32) -> RingBuffer {
        RingBuffer::new(capacity).unwrap()
    }

    #[test]
    fn insert_rejected_when_block_does_not_fit() {
        let f = fifo(16);
        assert_eq!(f.insert(&[1; 10]), 10);
        let before = f.stats();
        assert_eq!(f.insert(&[2; 7]), 0);
        let after = f.stats();
        assert_eq!(after.committed_size, before.committed_size);
        assert_eq!(after.overflow_count, before.overflow_count + 1);
        assert_eq!(f.free_length(), 6);
    }

    #[test]
    fn extract_clamps_to_available() {
        let f = fifo(16);
        f.insert(b"abc");
        let mut out = [0u8; 8];
        assert_eq!(f.extract(&mut out), 3);
        assert_eq!(&out[..3], b"abc");
        assert_eq!(f.extract(&mut out), 0);
    }

    #[test]
    fn second_reader_is_turned_away_while_first_holds_token() {
        let f = fifo(16);
        f.insert(b"abcdef");
        // Simulate a reader mid-copy.
        let (start, len) = f.reserve_read(4).unwrap();
        assert_eq!((start, len), (0, 4));
        let mut out = [0u8; 4];
        assert_eq!(f.extract(&mut out), 0);
        assert_eq!(f.discard(2), 0);
        f.release_read(len);
        assert_eq!(f.extract(&mut out[..2]), 2);
        assert_eq!(&out[..2], b"ef");
    }

    #[test]
    fn commit_waits_for_last_writer() {
        let f = fifo(32);
        let a = f.reserve_write(8, OverflowPolicy::RejectOnFull).unwrap();
        let b = f.reserve_write(8, OverflowPolicy::RejectOnFull).unwrap();
        assert_eq!((a, b), (0, 8));
        assert_eq!(f.free_length(), 16);

        f.commit_write();
        // one writer still in flight: nothing visible yet
        assert_eq!(f.readable_length(), 0);
        f.commit_write();
        assert_eq!(f.readable_length(), 16);
        assert_eq!(f.stats().inflight_write_bytes, 0);
    }

    #[test]
    fn overwrite_refused_while_reading() {
        let f = fifo(8);
        assert_eq!(f.insert(&[1; 8]), 8);
        let (_, len) = f.reserve_read(4).unwrap();
        assert_eq!(f.insert_overwrite(&[2; 2]), 0);
        assert_eq!(f.stats().overflow_count, 1);
        f.release_read(len);
        assert_eq!(f.insert_overwrite(&[2; 2]), 2);
    }

    #[test]
    fn overwrite_partial_eviction_keeps_stream_contiguous() {
        let f = fifo(10);
        assert_eq!(f.insert(b"abcdefgh"), 8);
        // 2 free, 5 needed: the 3 oldest bytes go
        assert_eq!(f.insert_overwrite(b"12345"), 5);
        assert_eq!(f.readable_length(), 10);
        let mut out = [0u8; 10];
        assert_eq!(f.extract(&mut out), 10);
        assert_eq!(&out, b"defgh12345");
    }

    #[test]
    fn overwrite_rejected_when_writers_hold_the_space() {
        let f = fifo(10);
        let _ = f.reserve_write(8, OverflowPolicy::RejectOnFull).unwrap();
        assert_eq!(f.insert_overwrite(&[0; 4]), 0);
        f.commit_write();
        assert_eq!(f.readable_length(), 8);
    }

    #[test]
    fn box_writer_token_is_exclusive() {
        let f = fifo(16);
        f.counters.wr_cnt.store(1);
        assert_eq!(f.box_insert(b"abcd"), 0);
        f.counters.wr_cnt.store(0);
        assert_eq!(f.box_insert(b"abcd"), 4);
    }

    #[test]
    fn box_value_larger_than_half_is_rejected() {
        let f = fifo(8);
        assert_eq!(f.box_insert(&[0; 5]), 0);
        assert_eq!(f.stats().overflow_count, 1);
        let mut out = [0u8; 5];
        assert_eq!(f.box_extract(&mut out, 5), 0);
    }

    #[test]
    fn box_halves_alternate() {
        let f = fifo(8);
        f.box_insert(b"aaaa");
        let mut out = [0u8; 4];
        f.box_extract(&mut out, 4);
        assert_eq!(f.stats().read_cursor, 4);
        f.box_insert(b"bbbb");
        f.box_extract(&mut out, 4);
        assert_eq!(&out, b"bbbb");
        assert_eq!(f.stats().read_cursor, 0);
    }

    #[test]
    fn reset_refuses_with_writer_in_flight() {
        let f = fifo(8);
        f.insert(b"xy");
        let _ = f.reserve_write(2, OverflowPolicy::RejectOnFull).unwrap();
        assert!(!f.reset());
        f.commit_write();
        assert!(f.reset());
        assert_eq!(f.readable_length(), 0);
        assert_eq!(f.free_length(), 8);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::new(0);
    }
}
