pub mod SharedMemory;
pub mod counter;
pub mod futex;
pub mod semaphore;

pub use counter::Counter;
pub use semaphore::Semaphore;
pub use SharedMemory::{
    create_heap_memory, create_shared_memory, HeapMemory, RawHandle, SharedMemoryBackend,
};
