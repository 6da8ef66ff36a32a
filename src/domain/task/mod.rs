//! Task domain - experiment tasks, worker messages and results

mod entity;
mod runner;

pub use entity::{
    BatchSummary, ExperimentOutcome, ExperimentTask, ParallelExecutionResult, WorkerRequest,
};
pub use runner::{ExperimentFunction, TaskRunner};

#[cfg(test)]
pub use runner::MockTaskRunner;
