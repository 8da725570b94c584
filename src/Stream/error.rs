use super::StreamId;

/// Failures of the stream layer. The FIFO underneath never errors; it only
/// rejects, and those rejections surface here as `Ok(0)` or as waits.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream {0} is not open")]
    NotOpen(StreamId),

    #[error("stream {0} is already open")]
    AlreadyOpen(StreamId),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("stream arena exhausted: need {needed} bytes, {available} left")]
    OutOfMemory { needed: usize, available: usize },

    #[error("block of {len} bytes can never fit a stream of {capacity} bytes")]
    TooLarge { len: usize, capacity: u32 },

    #[error("stream {0} has a transfer in flight")]
    Busy(StreamId),

    #[error("timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
