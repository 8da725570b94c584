use std::fmt;

/// Number of stream slots in a table.
pub const MAX_STREAMS: usize = 100;

/// A bounds-checked stream handle. Holding one means the index is valid for
/// any [`super::StreamTable`], not that the stream is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u16);

impl StreamId {
    pub const fn new(raw: usize) -> Option<Self> {
        if raw < MAX_STREAMS {
            Some(Self(raw as u16))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i32> for StreamId {
    type Error = i32;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        usize::try_from(raw)
            .ok()
            .and_then(StreamId::new)
            .ok_or(raw)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
