use std::cell::RefCell;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::Core::Semaphore;

/// Most tasks a runtime will create.
pub const MAX_TASKS: usize = 100;

/// Stack size of every task thread.
pub const TASK_STACK_SIZE: usize = 1_000_000;

/// Longest task name in bytes (kernel thread names are 15 + NUL).
pub const TASK_NAME_MAX: usize = 15;

struct TaskInfo {
    name: Arc<str>,
    priority: i32,
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<TaskInfo>>> = const { RefCell::new(None) };
}

/// Name of the task running on this thread, `None` outside tasks.
pub fn current_task_name() -> Option<Arc<str>> {
    CURRENT.with(|c| c.borrow().as_ref().map(|t| Arc::clone(&t.name)))
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= TASK_NAME_MAX {
        return name;
    }
    let mut end = TASK_NAME_MAX;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Creates named task threads that are held at a start gate until
/// [`start`](Self::start).
pub struct TaskRuntime {
    spawned: AtomicUsize,
    started: AtomicBool,
    start_gate: Arc<Semaphore>,
}

impl Default for TaskRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRuntime {
    pub fn new() -> Self {
        Self {
            spawned: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            start_gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Create task `name` running `f`.
    ///
    /// Returns once the new thread has registered itself. Before
    /// [`start`](Self::start) it then waits at the gate; afterwards it runs
    /// at once. `priority` is recorded, not enforced.
    pub fn spawn<F>(&self, name: &str, priority: i32, f: F) -> io::Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawned
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < MAX_TASKS).then_some(n + 1)
            })
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("task limit of {MAX_TASKS} reached"),
                )
            })?;

        let info = Arc::new(TaskInfo {
            name: Arc::from(truncate_name(name)),
            priority,
        });
        let registered = Arc::new(Semaphore::new(0));
        debug!(task = %info.name, priority, "creating task");

        let thread = {
            let info = Arc::clone(&info);
            let registered = Arc::clone(&registered);
            let gate = Arc::clone(&self.start_gate);
            thread::Builder::new()
                .name(info.name.to_string())
                .stack_size(TASK_STACK_SIZE)
                .spawn(move || {
                    CURRENT.with(|c| *c.borrow_mut() = Some(Arc::clone(&info)));
                    registered.release();
                    // pass the gate on so every waiting task gets through
                    gate.acquire();
                    gate.release();
                    info!(task = %info.name, "task started");
                    f();
                    info!(task = %info.name, "task stopped");
                })
        };
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                self.spawned.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        };
        registered.acquire();

        Ok(TaskHandle { info, thread })
    }

    /// Open the start gate. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(tasks = self.task_count(), "runtime started");
        self.start_gate.release();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Tasks created so far.
    pub fn task_count(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }
}

/// Owner of a spawned task thread.
pub struct TaskHandle {
    info: Arc<TaskInfo>,
    thread: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn priority(&self) -> i32 {
        self.info.priority
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the task to return. `Err` carries the panic payload.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("finished", &self.is_finished())
            .finish()
    }
}
