//! Parallel batch execution and task runners

mod cached_runner;
mod parallel;
mod process_runner;

pub use cached_runner::CachedTaskRunner;
pub use parallel::{BatchHandle, CompletionCallback, ExecutorConfig, ParallelExecutor};
pub use process_runner::{ProcessTaskRunner, WorkerCommand};
