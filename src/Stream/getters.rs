use super::{StreamId, StreamOptions, StreamTable, MAX_STREAMS};
use crate::Core::RawHandle;

/// Read-only accessors for monitoring and debug output.
impl StreamTable {
    /// Total arena size in bytes.
    pub fn arena_size(&self) -> usize {
        self.arena.size()
    }

    /// Arena bytes handed out so far, alignment padding included.
    pub fn arena_used(&self) -> usize {
        *self.cursor.lock()
    }

    pub fn arena_available(&self) -> usize {
        self.arena_size().saturating_sub(self.arena_used())
    }

    /// OS handle of the arena, for sharing it with another process.
    pub fn arena_handle(&self) -> RawHandle {
        self.arena.raw_handle()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.read().is_some()).count()
    }

    /// Ids of every open stream, in slot order.
    pub fn open_ids(&self) -> Vec<StreamId> {
        (0..MAX_STREAMS)
            .filter_map(StreamId::new)
            .filter(|&id| self.is_open(id))
            .collect()
    }

    /// Options stream `id` was opened with.
    pub fn options(&self, id: StreamId) -> Option<StreamOptions> {
        self.slot_snapshot(id).map(|s| s.options)
    }
}
