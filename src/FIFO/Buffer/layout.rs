use crate::Core::SharedMemory::{HeapMemory, SharedMemoryBackend};
use std::io;
use std::ptr::{self, NonNull};
use std::sync::Arc;

/// A contiguous byte range inside FIFO storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

/// Split a `len`-byte region starting at `offset` into the part that fits
/// before the end of storage and the part that wraps to the front.
///
/// The second span is empty when nothing wraps.
#[inline]
pub fn wrap_spans(offset: u32, len: u32, capacity: u32) -> [Span; 2] {
    debug_assert!(offset < capacity && len <= capacity);
    let (offset, len, capacity) = (offset as usize, len as usize, capacity as usize);
    let head = len.min(capacity - offset);
    [
        Span { offset, len: head },
        Span {
            offset: 0,
            len: len - head,
        },
    ]
}

/// The byte band a FIFO owns, either a whole heap block or a slice of a
/// larger region shared with other FIFOs.
pub struct Storage {
    /// Keeps the mapping alive for as long as `base` is used.
    region: Arc<dyn SharedMemoryBackend>,
    base: NonNull<u8>,
    len: usize,
}

// Access to the band is coordinated by the FIFO's reservation counters.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Storage {
    /// A fresh zeroed heap block of `len` bytes.
    pub fn owned(len: usize) -> io::Result<Self> {
        let region: Arc<dyn SharedMemoryBackend> = Arc::new(HeapMemory::new(len)?);
        Self::carve(region, 0, len)
    }

    /// Borrow `[offset, offset + len)` of `region`.
    pub fn carve(region: Arc<dyn SharedMemoryBackend>, offset: usize, len: usize) -> io::Result<Self> {
        let end = offset.checked_add(len).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Storage band overflows usize")
        })?;
        if end > region.size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Storage band {}..{} exceeds region of {} bytes",
                    offset,
                    end,
                    region.size()
                ),
            ));
        }
        let base = NonNull::new(unsafe { region.as_ptr().add(offset) }).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "Region has a null base pointer")
        })?;
        Ok(Self { region, base, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First byte of the band.
    pub fn base_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    pub fn region(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.region
    }

    /// Copy `src` into the band at `offset`.
    ///
    /// # Safety
    /// The caller must hold a reservation covering `[offset, offset + src.len())`
    /// so no other thread touches those bytes during the copy.
    #[inline]
    pub unsafe fn write_at(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len, "write outside FIFO band");
        ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr().add(offset), src.len());
    }

    /// Copy bytes at `offset` out into `dst`.
    ///
    /// # Safety
    /// Same contract as [`Storage::write_at`], for a read reservation.
    #[inline]
    pub unsafe fn read_at(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= self.len, "read outside FIFO band");
        ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
    }

    /// Write `src` starting at `start`, continuing at the front of the band
    /// past `capacity`. Tail segment first, then head.
    ///
    /// # Safety
    /// See [`Storage::write_at`].
    pub unsafe fn write_wrapped(&self, start: u32, capacity: u32, src: &[u8]) {
        let [tail, head] = wrap_spans(start, src.len() as u32, capacity);
        let (first, rest) = src.split_at(tail.len);
        self.write_at(tail.offset, first);
        if head.len != 0 {
            self.write_at(head.offset, rest);
        }
    }

    /// Read into `dst` starting at `start`, wrapping like `write_wrapped`.
    ///
    /// # Safety
    /// See [`Storage::read_at`].
    pub unsafe fn read_wrapped(&self, start: u32, capacity: u32, dst: &mut [u8]) {
        let [tail, head] = wrap_spans(start, dst.len() as u32, capacity);
        let (first, rest) = dst.split_at_mut(tail.len);
        self.read_at(tail.offset, first);
        if head.len != 0 {
            self.read_at(head.offset, rest);
        }
    }
}
