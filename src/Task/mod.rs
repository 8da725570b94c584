pub mod logging;
mod runtime;

pub use runtime::{current_task_name, TaskHandle, TaskRuntime, MAX_TASKS, TASK_NAME_MAX, TASK_STACK_SIZE};
