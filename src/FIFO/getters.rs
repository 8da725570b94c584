use super::{OverflowPolicy, RingBuffer};
use crate::Core::RawHandle;

/// Read-only accessors for diagnostics and the stream layer.
impl RingBuffer {
    /// Fixed byte capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Diagnostic tag given at construction.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Policy applied by `write`.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Writes rejected so far (sticks at `u32::MAX`).
    pub fn overflow_count(&self) -> u32 {
        self.counters.overflow.load()
    }

    /// OS handle of the region backing this FIFO.
    pub fn raw_handle(&self) -> RawHandle {
        self.storage.region().raw_handle()
    }

    /// Address of the first byte of this FIFO's band, for debug output.
    pub(crate) fn band_ptr(&self) -> *const u8 {
        self.storage.base_ptr()
    }
}
