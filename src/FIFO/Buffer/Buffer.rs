// This is the byte FIFO shared between tasks - one per stream

use super::layout::Storage;
use crate::Core::Counter;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// What a write does when the FIFO lacks room for the whole block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Reject the block, bump the overflow counter, return 0.
    #[default]
    RejectOnFull,
    /// Drop the oldest unread bytes to make room, unless a read is in flight.
    EvictOldestOnFull,
}

/// The shared counters of one FIFO.
///
/// Padded so the reader's and the writers' hot words never share a line.
#[derive(Default)]
pub(crate) struct FifoCounters {
    /// Bytes committed and visible to the reader.
    pub size: CachePadded<Counter>,
    /// Next write offset, kept in `[0, capacity)`.
    pub wr_idx: CachePadded<Counter>,
    /// Next read offset, kept in `[0, capacity)`.
    pub rd_idx: CachePadded<Counter>,
    /// Writers holding a reservation.
    pub wr_cnt: CachePadded<Counter>,
    /// Bytes reserved by in-flight writers, folded into `size` by the last one out.
    pub wr_size: CachePadded<Counter>,
    /// Bytes reserved by the in-flight read; non-zero means "reader busy".
    pub rd_size: CachePadded<Counter>,
    /// Rejected writes (saturating, diagnostics only).
    pub overflow: CachePadded<Counter>,
}

/// A fixed-capacity byte ring buffer for many writers and one reader.
///
/// ### Concurrency Design:
/// - **Writers**: reserve a region under the FIFO lock by advancing `wr_idx`,
///   copy their bytes with the lock released, then re-take the lock to drop
///   their reservation. The last writer out moves every pending byte into
///   `size` at once, so the reader sees batches, never half-copied regions.
/// - **Reader**: clamps to `size`, claims `rd_size` as a single-reader token,
///   advances `rd_idx`, copies, and finally returns the bytes to the free pool.
/// - **Box mode**: the band is split into two halves; writers always fill the
///   half the reader is not pointing at, readers flip halves when a fresh
///   value has been published.
///
/// No operation blocks beyond the short counter critical sections.
pub struct RingBuffer {
    pub(crate) counters: FifoCounters,

    /// Serializes multi-counter transitions.
    pub(crate) lock: Mutex<()>,

    pub(crate) storage: Storage,

    /// Fixed byte capacity.
    pub(crate) capacity: u32,

    /// Policy used by [`RingBuffer::write`].
    pub(crate) policy: OverflowPolicy,

    /// Diagnostic tag, usually the stream id.
    pub(crate) id: u16,
}
