use std::fmt;

use super::RingBuffer;

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_ring_buffer(self, f)
    }
}
