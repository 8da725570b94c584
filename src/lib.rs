//! Lock-light byte FIFO for concurrent writers and a single reader, with
//! a latest-value box mode, a stream multiplexer and a small task runtime
//! built on top.

// Module naming follows project convention (PascalCase top-level modules)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod FIFO;
#[allow(non_snake_case)]
pub mod Stream;
#[allow(non_snake_case)]
pub mod Task;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod ffi;

pub use FIFO::{FifoBuilder, FifoStats, OverflowPolicy, RingBuffer};
pub use Stream::{IoCommand, StreamError, StreamId, StreamOptions, StreamTable};
pub use Task::{TaskHandle, TaskRuntime};
