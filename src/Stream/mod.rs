//! Fixed-size registry of FIFO-backed streams with blocking reads,
//! multi-stream select and write notification hooks.

mod debug;
mod error;
mod getters;
mod handle;
mod options;
mod table;

pub use error::{StreamError, StreamResult};
pub use handle::{StreamId, MAX_STREAMS};
pub use options::{IoCommand, StreamOptions, Transfer};
pub use table::{StreamTable, WriteHandler};
