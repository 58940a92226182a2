pub mod model;
pub mod task_queue;

pub use model::{BackgroundColor, InputFile, TaskRecord, TaskResult, TaskStatus};
pub use task_queue::TaskQueue;
