// Backing-memory tests
// Run with: cargo test --test shared_memory -- --nocapture

use rtos_fifo::Core::{create_heap_memory, RawHandle, SharedMemoryBackend};
use rtos_fifo::FIFO::{FifoBuilder, RingBuffer};
use std::sync::Arc;

#[test]
fn test_heap_memory_is_zeroed_and_aligned() {
    let size = 4096;
    let mem = create_heap_memory(size).unwrap();

    assert_eq!(mem.size(), size);
    assert_eq!(mem.as_ptr() as usize % 128, 0);
    assert_eq!(mem.raw_handle(), RawHandle::Anonymous);

    unsafe {
        let slice = std::slice::from_raw_parts(mem.as_ptr(), size);
        assert!(slice.iter().all(|&b| b == 0));
    }
}

#[test]
fn test_heap_memory_rejects_zero_size() {
    let err = create_heap_memory(0).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_two_fifos_share_one_region_without_overlap() {
    let region: Arc<dyn SharedMemoryBackend> = Arc::from(create_heap_memory(256).unwrap());
    let a = RingBuffer::with_region(Arc::clone(&region), 0, 128).unwrap();
    let b = RingBuffer::with_region(Arc::clone(&region), 128, 128).unwrap();

    assert_eq!(a.insert(&[0xAA; 128]), 128);
    assert_eq!(b.insert(&[0xBB; 128]), 128);

    let mut out = [0u8; 128];
    assert_eq!(a.extract(&mut out), 128);
    assert!(out.iter().all(|&x| x == 0xAA));
    assert_eq!(b.extract(&mut out), 128);
    assert!(out.iter().all(|&x| x == 0xBB));
}

#[test]
fn test_band_past_region_end_is_refused() {
    let region: Arc<dyn SharedMemoryBackend> = Arc::from(create_heap_memory(100).unwrap());
    let err = FifoBuilder::new()
        .with_capacity(64)
        .build_in(region, 50)
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[cfg(target_os = "linux")]
mod linux_tests {
    use rtos_fifo::Core::{create_shared_memory, RawHandle, SharedMemoryBackend};
    use rtos_fifo::FIFO::FifoBuilder;
    use std::sync::Arc;

    #[test]
    fn test_create_shared_memory() {
        let size = 4096;
        let shm = create_shared_memory(size, Some("test_create")).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
    }

    #[test]
    fn test_shared_memory_size() {
        for size in [1024, 4096, 65536, 1024 * 1024] {
            let shm = create_shared_memory(size, None).unwrap();
            assert_eq!(shm.size(), size);
        }
    }

    #[test]
    fn test_raw_handle() {
        let shm = create_shared_memory(4096, Some("test_handle")).unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
            RawHandle::Anonymous => panic!("memfd region should expose its descriptor"),
        }
    }

    #[test]
    fn test_mmap_zero_initialized() {
        let size = 1024;
        let shm = create_shared_memory(size, Some("test_zero")).unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0), "memfd pages start zeroed");
        }
    }

    #[test]
    fn test_fifo_over_memfd_wraps() {
        let shm: Arc<dyn SharedMemoryBackend> =
            Arc::from(create_shared_memory(4096, Some("test_fifo")).unwrap());
        let fifo = FifoBuilder::new()
            .with_capacity(10)
            .build_in(Arc::clone(&shm), 1000)
            .unwrap();
        assert!(matches!(fifo.raw_handle(), RawHandle::Fd(_)));

        let mut out = [0u8; 8];
        assert_eq!(fifo.insert(b"12345678"), 8);
        assert_eq!(fifo.extract(&mut out[..6]), 6);
        // cursor at 8: this block straddles the end of the band
        assert_eq!(fifo.insert(b"abcdefgh"), 8);
        assert_eq!(fifo.extract(&mut out[..2]), 2);
        assert_eq!(&out[..2], b"78");
        assert_eq!(fifo.extract(&mut out), 8);
        assert_eq!(&out, b"abcdefgh");

        // the band sits at offset 1000 of the mapping
        unsafe {
            let band = std::slice::from_raw_parts(shm.as_ptr().add(1000), 10);
            assert_eq!(&band[8..], b"ab");
            assert_eq!(&band[..6], b"cdefgh");
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use rtos_fifo::Core::create_shared_memory;

    #[test]
    fn test_unsupported_platform() {
        let err = create_shared_memory(4096, None).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }
}
