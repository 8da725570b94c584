// Backing memory for FIFO storage.
// Heap blocks for in-process use, memfd_create + mmap on Linux when the raw
// buffer should be mappable by someone else holding the fd.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::io;
use std::ptr::NonNull;

/// Alignment of every region handed out (one cache line pair).
pub const REGION_ALIGN: usize = 128;

/// Memory region trait; FIFOs borrow byte ranges out of one of these.
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the start of the region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the region in bytes
    fn size(&self) -> usize;

    /// Get the underlying OS handle, if any
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor (Linux memfd)
    Fd(i32),
    /// Process-private heap block, nothing to share
    Anonymous,
}

/// Create a zeroed, process-private region of `size` bytes.
pub fn create_heap_memory(size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(HeapMemory::new(size)?))
}

/// Create a new shared memory region with the specified size
///
/// # Arguments
/// * `size` - Size of the shared memory region in bytes
/// * `name` - Optional debug name for the memfd (shows up in /proc/<pid>/fd)
#[cfg(target_os = "linux")]
pub fn create_shared_memory(
    size: usize,
    name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(
    _size: usize,
    _name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

/// Zeroed heap block aligned to `REGION_ALIGN`.
#[derive(Debug)]
pub struct HeapMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The block is only reachable through raw pointers; FIFOs coordinate access.
unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl HeapMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "HeapMemory::new(): size must be non-zero",
            ));
        }
        let layout = Layout::from_size_align(size, REGION_ALIGN)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("Failed to allocate {size} bytes of FIFO storage"),
            )
        })?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl SharedMemoryBackend for HeapMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Anonymous
    }
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    /// Create an anonymous memfd of `size` bytes and map it shared.
    pub fn create(size: usize, name: Option<&str>) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "LinuxSharedMemory::create(): size must be non-zero",
            ));
        }
        let c_name = std::ffi::CString::new(name.unwrap_or("rtos_fifo")).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid shared memory name: {e}"),
            )
        })?;

        let fd = unsafe { libc::memfd_create(c_name.as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // Set size
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // Map memory; mmap returns page-aligned addresses, which covers REGION_ALIGN
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping")
        })?;

        Ok(Self { ptr, size, fd })
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }
}
