use crate::FIFO::OverflowPolicy;

/// How bytes move through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Byte FIFO; writes queue up behind each other.
    Queue(OverflowPolicy),
    /// Latest-value slot holding one element.
    Box,
}

/// Requests understood by [`super::StreamTable::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCommand {
    /// Readable bytes.
    DataCount,
    /// Element size the stream was opened with.
    ElementSize,
    /// Bytes a writer could add right now.
    FreeSize,
    /// Drop all buffered data. Fails with `Busy` while a transfer is in flight.
    Reset,
}

/// Parameters for [`super::StreamTable::open`].
///
/// Streams block by default: reads wait for a full element, queue writes
/// wait for room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    elem_size: u32,
    count: u32,
    blocking: bool,
    transfer: Transfer,
}

impl StreamOptions {
    /// `count` elements of `elem_size` bytes each.
    pub fn new(elem_size: u32, count: u32) -> Self {
        Self {
            elem_size,
            count,
            blocking: true,
            transfer: Transfer::Queue(OverflowPolicy::RejectOnFull),
        }
    }

    /// Reads return what is there; rejected writes are dropped.
    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// When full, drop the oldest data instead of the new write. A blocking
    /// writer still waits out a read in progress.
    pub fn overwrite(mut self) -> Self {
        self.transfer = Transfer::Queue(OverflowPolicy::EvictOldestOnFull);
        self
    }

    /// Keep only the most recent element.
    pub fn boxed(mut self) -> Self {
        self.transfer = Transfer::Box;
        self
    }

    pub fn elem_size(&self) -> u32 {
        self.elem_size
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    /// Bytes of FIFO storage this stream needs. Box streams always get two
    /// element-sized halves, whatever `count` says.
    pub fn capacity(&self) -> Option<u32> {
        if self.elem_size == 0 || self.count == 0 {
            return None;
        }
        match self.transfer {
            Transfer::Box => self.elem_size.checked_mul(2),
            Transfer::Queue(_) => self.elem_size.checked_mul(self.count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_mode() {
        assert_eq!(StreamOptions::new(16, 4).capacity(), Some(64));
        assert_eq!(StreamOptions::new(16, 4).boxed().capacity(), Some(32));
        assert_eq!(StreamOptions::new(0, 4).capacity(), None);
        assert_eq!(StreamOptions::new(u32::MAX, 2).capacity(), None);
    }

    #[test]
    fn flags_compose() {
        let o = StreamOptions::new(8, 8).non_blocking().overwrite();
        assert!(!o.is_blocking());
        assert_eq!(o.transfer(), Transfer::Queue(OverflowPolicy::EvictOldestOnFull));
    }
}
