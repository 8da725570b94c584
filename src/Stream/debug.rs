use std::fmt;

use super::StreamTable;

impl fmt::Debug for StreamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_stream_table(self, f)
    }
}
