use std::fmt;

use crate::FIFO::RingBuffer;
use crate::Stream::StreamTable;

/// Debug function for RingBuffer
///
/// Shows the band address and a counter snapshot without touching the
/// stored bytes.
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let stats = buffer.stats();
    f.debug_struct("RingBuffer")
        .field("id", &buffer.id())
        .field("band", &format_args!("{:p}", buffer.band_ptr()))
        .field("capacity", &stats.capacity)
        .field("policy", &buffer.policy())
        .field("size", &stats.committed_size)
        .field("wr_idx", &stats.write_cursor)
        .field("rd_idx", &stats.read_cursor)
        .field("wr_cnt", &stats.inflight_write_count)
        .field("wr_size", &stats.inflight_write_bytes)
        .field("rd_size", &stats.inflight_read_bytes)
        .field("overflow", &stats.overflow_count)
        .finish()
}

/// Debug function for StreamTable
///
/// Shows arena usage and the ids of open streams
pub fn debug_stream_table(table: &StreamTable, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let open: Vec<u16> = table.open_ids().into_iter().map(|id| id.get()).collect();
    f.debug_struct("StreamTable")
        .field("arena_size", &table.arena_size())
        .field("arena_used", &table.arena_used())
        .field("handle", &table.arena_handle())
        .field("open", &open)
        .finish()
}
