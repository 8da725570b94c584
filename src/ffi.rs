//! C ABI over [`RingBuffer`]. Every call returns a byte count; 0 means
//! rejected, empty, or a null handle.

use std::ptr;
use std::slice;

use crate::FIFO::{FifoBuilder, RingBuffer};

/// Opaque FIFO handle owned by the C side.
pub struct FifoHandle {
    inner: RingBuffer,
}

/// Borrow the FIFO behind `handle`, or `None` for null.
///
/// # Safety
/// A non-null `handle` must come from [`rtfifo_new`] and not have been freed.
unsafe fn fifo<'a>(handle: *const FifoHandle) -> Option<&'a RingBuffer> {
    handle.as_ref().map(|h| &h.inner)
}

// -----------------------------------------------------------------------------
// Lifetime
// -----------------------------------------------------------------------------

/// Create a FIFO of `capacity` bytes.
///
/// # Returns
/// * Pointer to `FifoHandle`, or NULL if `capacity` is 0 or allocation fails.
#[no_mangle]
pub extern "C" fn rtfifo_new(capacity: u32) -> *mut FifoHandle {
    match FifoBuilder::new().with_capacity(capacity).build() {
        Ok(fifo) => Box::into_raw(Box::new(FifoHandle { inner: fifo })),
        Err(e) => {
            tracing::warn!(capacity, error = %e, "rtfifo_new failed");
            ptr::null_mut()
        }
    }
}

/// Free a FIFO handle. NULL is ignored.
///
/// # Safety
/// `handle` must come from [`rtfifo_new`], be freed once, and have no
/// operation running on it.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_free(handle: *mut FifoHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// -----------------------------------------------------------------------------
// Byte FIFO
// -----------------------------------------------------------------------------

/// Append `len` bytes from `data`, all or nothing. NULL `data` reserves the
/// space without copying.
///
/// # Safety
/// `data`, when non-null, must be valid for `len` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_insert(handle: *mut FifoHandle, data: *const u8, len: u32) -> u32 {
    let Some(fifo) = fifo(handle) else {
        return 0;
    };
    if data.is_null() {
        return fifo.reserve(len);
    }
    fifo.insert(slice::from_raw_parts(data, len as usize))
}

/// Append `len` bytes, evicting the oldest data when full. NULL `data`
/// is rejected.
///
/// # Safety
/// `data`, when non-null, must be valid for `len` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_insert_overwrite(
    handle: *mut FifoHandle,
    data: *const u8,
    len: u32,
) -> u32 {
    match fifo(handle) {
        Some(fifo) if !data.is_null() => {
            fifo.insert_overwrite(slice::from_raw_parts(data, len as usize))
        }
        _ => 0,
    }
}

/// Append `cnt` blocks as one all-or-nothing write. Any NULL block rejects
/// the whole call.
///
/// # Safety
/// `data` and `lens` must each point to `cnt` entries; every `data[i]` must
/// be valid for `lens[i]` bytes.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_insert_blocks(
    handle: *mut FifoHandle,
    data: *const *const u8,
    lens: *const u32,
    cnt: u32,
) -> u32 {
    let Some(fifo) = fifo(handle) else {
        return 0;
    };
    if data.is_null() || lens.is_null() {
        return 0;
    }
    let ptrs = slice::from_raw_parts(data, cnt as usize);
    let lens = slice::from_raw_parts(lens, cnt as usize);
    if ptrs.iter().any(|p| p.is_null()) {
        return 0;
    }
    let segments: Vec<&[u8]> = ptrs
        .iter()
        .zip(lens)
        .map(|(&p, &l)| slice::from_raw_parts(p, l as usize))
        .collect();
    fifo.insert_batch(&segments)
}

/// Take up to `len` bytes into `buf`. NULL `buf` discards them.
///
/// # Safety
/// `buf`, when non-null, must be valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_extract(handle: *mut FifoHandle, buf: *mut u8, len: u32) -> u32 {
    let Some(fifo) = fifo(handle) else {
        return 0;
    };
    if buf.is_null() {
        return fifo.discard(len);
    }
    fifo.extract(slice::from_raw_parts_mut(buf, len as usize))
}

// -----------------------------------------------------------------------------
// Box mode
// -----------------------------------------------------------------------------

/// Publish `len` bytes as the latest value.
///
/// # Safety
/// `data` must be valid for `len` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_box_insert(
    handle: *mut FifoHandle,
    data: *const u8,
    len: u32,
) -> u32 {
    match fifo(handle) {
        Some(fifo) if !data.is_null() => fifo.box_insert(slice::from_raw_parts(data, len as usize)),
        _ => 0,
    }
}

/// Copy the latest `len`-byte value into `buf`.
///
/// # Safety
/// `buf` must be valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_box_extract(handle: *mut FifoHandle, buf: *mut u8, len: u32) -> u32 {
    match fifo(handle) {
        Some(fifo) if !buf.is_null() => {
            fifo.box_extract(slice::from_raw_parts_mut(buf, len as usize), len)
        }
        _ => 0,
    }
}

// -----------------------------------------------------------------------------
// Queries
// -----------------------------------------------------------------------------

/// Readable bytes.
///
/// # Safety
/// See [`rtfifo_free`] for handle validity.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_data_len(handle: *const FifoHandle) -> u32 {
    fifo(handle).map_or(0, RingBuffer::readable_length)
}

/// Bytes a writer could add right now.
///
/// # Safety
/// See [`rtfifo_free`] for handle validity.
#[no_mangle]
pub unsafe extern "C" fn rtfifo_free_len(handle: *const FifoHandle) -> u32 {
    fifo(handle).map_or(0, RingBuffer::free_length)
}
