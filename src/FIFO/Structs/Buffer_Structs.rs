// Plain snapshots of FIFO state; no atomics, safe to copy around and print.

/// Point-in-time view of every FIFO counter, taken under the FIFO lock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FifoStats {
    pub capacity: u32,
    pub committed_size: u32,
    pub write_cursor: u32,
    pub read_cursor: u32,
    pub inflight_write_count: u32,
    pub inflight_write_bytes: u32,
    pub inflight_read_bytes: u32,
    pub overflow_count: u32,
}

impl FifoStats {
    /// Bytes neither committed nor reserved by a writer.
    pub fn free_length(&self) -> u32 {
        self.capacity
            .saturating_sub(self.committed_size.wrapping_add(self.inflight_write_bytes))
    }
}
