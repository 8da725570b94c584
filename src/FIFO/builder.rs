use std::sync::Arc;

use super::layout::Storage;
use super::{OverflowPolicy, RingBuffer};
use crate::Core::SharedMemoryBackend;

/// Configures a [`RingBuffer`] before it is created.
pub struct FifoBuilder {
    capacity: u32,
    id: u16,
    policy: OverflowPolicy,
}

impl Default for FifoBuilder {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024, // 64KB default
            id: 0,
            policy: OverflowPolicy::RejectOnFull,
        }
    }
}

impl FifoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    /// Policy applied by [`RingBuffer::write`].
    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn validate(&self) -> std::io::Result<()> {
        if self.capacity == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "FIFO capacity must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Build over a private heap block.
    pub fn build(self) -> std::io::Result<RingBuffer> {
        self.validate()?;
        let storage = Storage::owned(self.capacity as usize)?;
        Ok(RingBuffer::from_storage(storage, self.capacity, self.policy, self.id))
    }

    /// Build over `[offset, offset + capacity)` of `region`.
    pub fn build_in(
        self,
        region: Arc<dyn SharedMemoryBackend>,
        offset: usize,
    ) -> std::io::Result<RingBuffer> {
        self.validate()?;
        let storage = Storage::carve(region, offset, self.capacity as usize)?;
        Ok(RingBuffer::from_storage(storage, self.capacity, self.policy, self.id))
    }
}
