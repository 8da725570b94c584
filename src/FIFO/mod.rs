mod builder;
mod debug;
mod getters;

pub use builder::FifoBuilder;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{OverflowPolicy, RingBuffer}; // re-export for stable path
}

pub mod Structs {
    pub mod Buffer_Structs;
    pub use Buffer_Structs::FifoStats; // re-export for stable path
}

pub use Buffer::layout::{self, wrap_spans, Span};
pub use Buffer::{OverflowPolicy, RingBuffer};
pub use Structs::FifoStats;
