use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::error::{StreamError, StreamResult};
use super::handle::{StreamId, MAX_STREAMS};
use super::options::{IoCommand, StreamOptions, Transfer};
use crate::Core::{create_heap_memory, Semaphore, SharedMemoryBackend};
use crate::FIFO::{FifoBuilder, FifoStats, OverflowPolicy, RingBuffer};

/// Arena allocations start on this boundary.
const ARENA_ALIGN: usize = 8;

/// Longest a blocked caller sleeps before re-checking its condition.
const RECHECK: Duration = Duration::from_millis(10);

/// Called after every accepted write with the id of the stream written to.
pub type WriteHandler = Arc<dyn Fn(StreamId) + Send + Sync>;

pub(crate) struct StreamSlot {
    pub(crate) fifo: RingBuffer,
    pub(crate) options: StreamOptions,
    data_ready: Semaphore,
    space_ready: Semaphore,
    select: Mutex<Option<Arc<Semaphore>>>,
    handler: Mutex<Option<WriteHandler>>,
    closed: AtomicBool,
}

impl StreamSlot {
    fn new(fifo: RingBuffer, options: StreamOptions) -> Self {
        Self {
            fifo,
            options,
            data_ready: Semaphore::new(0),
            space_ready: Semaphore::new(0),
            select: Mutex::new(None),
            handler: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self, id: StreamId) -> StreamResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StreamError::NotOpen(id));
        }
        Ok(())
    }

    #[inline]
    fn elem_size(&self) -> u32 {
        self.options.elem_size()
    }

    /// At least one whole element is readable.
    fn has_element(&self) -> bool {
        self.fifo.readable_length() >= self.elem_size()
    }

    /// A blocking read of `want` bytes may proceed.
    fn ready_for(&self, want: u32) -> bool {
        let readable = self.fifo.readable_length();
        match self.options.transfer() {
            Transfer::Box => readable >= self.elem_size(),
            // byte streams hand out whatever has arrived
            Transfer::Queue(_) => readable >= want || (self.elem_size() == 1 && readable > 0),
        }
    }

    fn take(&self, buf: &mut [u8]) -> StreamResult<u32> {
        match self.options.transfer() {
            Transfer::Box => {
                if buf.len() < self.elem_size() as usize {
                    return Err(StreamError::InvalidArgument(
                        "box read buffer is shorter than one element",
                    ));
                }
                Ok(self.fifo.box_extract(buf, self.elem_size()))
            }
            Transfer::Queue(_) => Ok(self.fifo.extract(buf)),
        }
    }

    fn after_read(&self, n: u32) {
        if n == 0 {
            return;
        }
        self.space_ready.notify();
        if matches!(self.options.transfer(), Transfer::Queue(_)) && self.fifo.readable_length() > 0 {
            // leftovers for the next blocked reader
            self.data_ready.notify();
        }
    }

    fn after_write(&self, id: StreamId, n: u32) {
        if n == 0 {
            return;
        }
        self.data_ready.notify();
        if let Some(sem) = self.select.lock().as_ref() {
            sem.notify();
        }
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(id);
        }
    }

    /// Point this stream's write notifications at `sem` unless another
    /// select already owns it.
    fn arm(&self, sem: &Arc<Semaphore>) -> bool {
        let mut armed = self.select.lock();
        if armed.is_some() {
            return false;
        }
        *armed = Some(Arc::clone(sem));
        true
    }

    fn disarm(&self, sem: &Arc<Semaphore>) {
        let mut armed = self.select.lock();
        if armed.as_ref().is_some_and(|s| Arc::ptr_eq(s, sem)) {
            *armed = None;
        }
    }

    fn shut(&self) {
        self.closed.store(true, Ordering::Release);
        self.data_ready.notify();
        self.space_ready.notify();
        if let Some(sem) = self.select.lock().as_ref() {
            sem.notify();
        }
    }
}

/// Sleep on `sem` for one recheck slice, cut short by `deadline`.
/// Returns `false` once the deadline has passed.
fn park(sem: &Semaphore, deadline: Option<Instant>) -> bool {
    let slice = match deadline {
        None => RECHECK,
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            (deadline - now).min(RECHECK)
        }
    };
    sem.acquire_timeout(slice);
    true
}

/// Registry of up to [`MAX_STREAMS`] FIFO-backed streams sharing one arena.
///
/// FIFO bands are carved from the arena with a bump cursor. Closing a
/// stream frees its slot but not its bytes.
pub struct StreamTable {
    pub(super) slots: Box<[RwLock<Option<Arc<StreamSlot>>>]>,
    pub(super) arena: Arc<dyn SharedMemoryBackend>,
    pub(super) cursor: Mutex<usize>,
}

impl StreamTable {
    /// A table whose arena is a private heap block of `arena_bytes`.
    pub fn new(arena_bytes: usize) -> io::Result<Self> {
        let arena: Arc<dyn SharedMemoryBackend> = Arc::from(create_heap_memory(arena_bytes)?);
        Ok(Self::with_backend(arena))
    }

    /// A table carving its streams out of `backend`.
    pub fn with_backend(backend: Arc<dyn SharedMemoryBackend>) -> Self {
        let slots = (0..MAX_STREAMS).map(|_| RwLock::new(None)).collect();
        Self {
            slots,
            arena: backend,
            cursor: Mutex::new(0),
        }
    }

    pub(crate) fn stream(&self, id: StreamId) -> StreamResult<Arc<StreamSlot>> {
        self.slots[id.index()]
            .read()
            .clone()
            .ok_or(StreamError::NotOpen(id))
    }

    pub(crate) fn slot_snapshot(&self, id: StreamId) -> Option<Arc<StreamSlot>> {
        self.slots[id.index()].read().clone()
    }

    fn allocate(&self, len: usize) -> StreamResult<usize> {
        let mut cursor = self.cursor.lock();
        let start = *cursor;
        let size = self.arena.size();
        match start.checked_add(len).filter(|&end| end <= size) {
            Some(end) => {
                *cursor = end.next_multiple_of(ARENA_ALIGN);
                Ok(start)
            }
            None => {
                let available = size.saturating_sub(start);
                warn!(needed = len, available, "stream arena exhausted");
                Err(StreamError::OutOfMemory {
                    needed: len,
                    available,
                })
            }
        }
    }

    /// Create stream `id` with the given element layout and mode.
    pub fn open(&self, id: StreamId, options: StreamOptions) -> StreamResult<()> {
        let capacity = options.capacity().ok_or(StreamError::InvalidArgument(
            "element size and count must be non-zero and their product must fit in u32",
        ))?;
        let policy = match options.transfer() {
            Transfer::Queue(policy) => policy,
            Transfer::Box => OverflowPolicy::RejectOnFull,
        };

        let mut slot = self.slots[id.index()].write();
        if slot.is_some() {
            return Err(StreamError::AlreadyOpen(id));
        }
        let offset = self.allocate(capacity as usize)?;
        let fifo = FifoBuilder::new()
            .with_capacity(capacity)
            .with_id(id.get())
            .with_policy(policy)
            .build_in(Arc::clone(&self.arena), offset)?;
        *slot = Some(Arc::new(StreamSlot::new(fifo, options)));

        debug!(stream = %id, capacity, offset, mode = ?options.transfer(), "stream opened");
        Ok(())
    }

    pub fn is_open(&self, id: StreamId) -> bool {
        self.slots[id.index()].read().is_some()
    }

    /// Free the slot. Callers blocked on the stream return `NotOpen`.
    pub fn close(&self, id: StreamId) -> StreamResult<()> {
        let stream = self.slots[id.index()]
            .write()
            .take()
            .ok_or(StreamError::NotOpen(id))?;
        stream.shut();
        debug!(stream = %id, "stream closed");
        Ok(())
    }

    /// Read into `buf`. Blocking streams wait until `buf.len()` bytes (or one
    /// element for box streams) are available.
    pub fn read(&self, id: StreamId, buf: &mut [u8]) -> StreamResult<usize> {
        self.read_until(id, buf, None)
    }

    /// Like [`read`](Self::read) but gives up with `Timeout` after `timeout`.
    pub fn read_timeout(
        &self,
        id: StreamId,
        buf: &mut [u8],
        timeout: Duration,
    ) -> StreamResult<usize> {
        self.read_until(id, buf, Some(Instant::now() + timeout))
    }

    fn read_until(
        &self,
        id: StreamId,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> StreamResult<usize> {
        let stream = self.stream(id)?;
        if !stream.options.is_blocking() {
            let n = stream.take(buf)?;
            stream.after_read(n);
            return Ok(n as usize);
        }

        let capacity = stream.fifo.capacity();
        let want = match stream.options.transfer() {
            Transfer::Box => stream.elem_size(),
            Transfer::Queue(_) => u32::try_from(buf.len())
                .ok()
                .filter(|&w| w <= capacity)
                .ok_or(StreamError::TooLarge {
                    len: buf.len(),
                    capacity,
                })?,
        };
        if want == 0 {
            return Ok(0);
        }

        loop {
            stream.ensure_open(id)?;
            if stream.ready_for(want) {
                let n = stream.take(buf)?;
                if n > 0 {
                    stream.after_read(n);
                    trace!(stream = %id, n, "read");
                    return Ok(n as usize);
                }
                // lost the reader token to another caller
            }
            if !park(&stream.data_ready, deadline) {
                return Err(StreamError::Timeout);
            }
        }
    }

    /// Write `buf` according to the stream's mode. Blocking streams wait
    /// until the write is accepted. Returns the bytes accepted; `Ok(0)`
    /// means a non-blocking write was dropped.
    pub fn write(&self, id: StreamId, buf: &[u8]) -> StreamResult<usize> {
        let stream = self.stream(id)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match stream.options.transfer() {
            Transfer::Box => {
                if buf.len() != stream.elem_size() as usize {
                    return Err(StreamError::InvalidArgument(
                        "box writes must be exactly one element",
                    ));
                }
                if stream.options.is_blocking() {
                    // only a concurrent box write can refuse this one
                    self.write_retry(id, &stream, || stream.fifo.box_insert(buf))?
                } else {
                    stream.fifo.box_insert(buf)
                }
            }
            Transfer::Queue(OverflowPolicy::EvictOldestOnFull) if !stream.options.is_blocking() => {
                stream.fifo.insert_overwrite(buf)
            }
            Transfer::Queue(OverflowPolicy::EvictOldestOnFull) => {
                let capacity = stream.fifo.capacity();
                if u32::try_from(buf.len()).map_or(true, |l| l > capacity) {
                    return Err(StreamError::TooLarge {
                        len: buf.len(),
                        capacity,
                    });
                }
                // refused while a read is in flight; the reader posts space_ready
                self.write_retry(id, &stream, || stream.fifo.insert_overwrite(buf))?
            }
            Transfer::Queue(OverflowPolicy::RejectOnFull) if !stream.options.is_blocking() => {
                stream.fifo.insert(buf)
            }
            Transfer::Queue(OverflowPolicy::RejectOnFull) => self.write_blocking(id, &stream, buf)?,
        };
        stream.after_write(id, n);
        trace!(stream = %id, n, "write");
        Ok(n as usize)
    }

    fn write_blocking(&self, id: StreamId, stream: &StreamSlot, buf: &[u8]) -> StreamResult<u32> {
        let capacity = stream.fifo.capacity();
        let len = u32::try_from(buf.len())
            .ok()
            .filter(|&l| l <= capacity)
            .ok_or(StreamError::TooLarge {
                len: buf.len(),
                capacity,
            })?;
        loop {
            stream.ensure_open(id)?;
            // Check first so that waiting does not inflate the overflow count.
            if stream.fifo.free_length() >= len {
                let n = stream.fifo.insert(buf);
                if n > 0 {
                    if stream.fifo.free_length() > 0 {
                        // room left for the next blocked writer
                        stream.space_ready.notify();
                    }
                    return Ok(n);
                }
            }
            park(&stream.space_ready, None);
        }
    }

    /// Retry `insert` until it accepts the write or the stream closes.
    fn write_retry(
        &self,
        id: StreamId,
        stream: &StreamSlot,
        insert: impl Fn() -> u32,
    ) -> StreamResult<u32> {
        loop {
            stream.ensure_open(id)?;
            let n = insert();
            if n > 0 {
                return Ok(n);
            }
            park(&stream.space_ready, None);
        }
    }

    /// Wait until one of `ids` holds a whole element. Returns its index in
    /// `ids`. Closed streams are skipped; once every watched stream has
    /// closed the wait ends with `NotOpen`. `None` waits forever.
    pub fn select(&self, ids: &[StreamId], timeout: Option<Duration>) -> StreamResult<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let sem = Arc::new(Semaphore::new(0));

        let watched: Vec<(usize, Arc<StreamSlot>, bool)> = ids
            .iter()
            .enumerate()
            .filter_map(|(i, &id)| self.slot_snapshot(id).map(|s| (i, s)))
            .map(|(i, s)| {
                let armed = s.arm(&sem);
                (i, s, armed)
            })
            .collect();
        if watched.is_empty() {
            return Err(StreamError::InvalidArgument("no open stream to select on"));
        }

        let result = loop {
            let ready = watched
                .iter()
                .find(|(_, s, _)| !s.closed.load(Ordering::Acquire) && s.has_element());
            if let Some((i, _, _)) = ready {
                break Ok(*i);
            }
            if watched.iter().all(|(_, s, _)| s.closed.load(Ordering::Acquire)) {
                break Err(StreamError::NotOpen(ids[watched[0].0]));
            }
            if !park(&sem, deadline) {
                break Err(StreamError::Timeout);
            }
        };

        for (_, stream, armed) in &watched {
            if *armed {
                stream.disarm(&sem);
            }
        }
        result
    }

    /// Query or control stream `id`.
    pub fn ioctl(&self, id: StreamId, cmd: IoCommand) -> StreamResult<u32> {
        let stream = self.stream(id)?;
        match cmd {
            IoCommand::DataCount => Ok(stream.fifo.readable_length()),
            IoCommand::ElementSize => Ok(stream.elem_size()),
            IoCommand::FreeSize => Ok(stream.fifo.free_length()),
            IoCommand::Reset => {
                if !stream.fifo.reset() {
                    return Err(StreamError::Busy(id));
                }
                stream.space_ready.notify();
                debug!(stream = %id, "stream reset");
                Ok(0)
            }
        }
    }

    /// Install or remove the write notification hook of stream `id`.
    pub fn set_handler(&self, id: StreamId, handler: Option<WriteHandler>) -> StreamResult<()> {
        let stream = self.stream(id)?;
        *stream.handler.lock() = handler;
        Ok(())
    }

    /// Counter snapshot of stream `id`'s FIFO.
    pub fn stats(&self, id: StreamId) -> StreamResult<FifoStats> {
        Ok(self.stream(id)?.fifo.stats())
    }
}
