//! Task runner that isolates each task in its own OS process

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::ExecutorConfig;
use crate::domain::task::{ExperimentOutcome, ExperimentTask, TaskRunner, WorkerRequest};
use crate::domain::DomainError;

/// Program and arguments that start one worker process
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// This binary's own `worker` subcommand
    pub fn current_exe() -> Result<Self, DomainError> {
        let program = std::env::current_exe().map_err(|e| {
            DomainError::configuration(format!("Cannot locate current executable: {}", e))
        })?;

        Ok(Self::new(program).with_args(["worker"]))
    }

    /// The configured worker program, or [`WorkerCommand::current_exe`]
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, DomainError> {
        match &config.worker_program {
            Some(program) => Ok(Self::new(program).with_args(config.worker_args.iter().cloned())),
            None => Self::current_exe(),
        }
    }
}

/// Sends each task as a [`WorkerRequest`] on a fresh worker's stdin and
/// reads the [`ExperimentOutcome`] back from its stdout
///
/// The child is killed when the returned future is dropped, so executor
/// timeouts never leave orphaned workers behind.
#[derive(Debug, Clone)]
pub struct ProcessTaskRunner {
    command: WorkerCommand,
    sandbox: bool,
}

impl ProcessTaskRunner {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            sandbox: false,
        }
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }
}

#[async_trait]
impl TaskRunner for ProcessTaskRunner {
    async fn run(&self, task: &ExperimentTask) -> Result<ExperimentOutcome, DomainError> {
        let request = WorkerRequest {
            task: task.clone(),
            sandbox: self.sandbox,
        };
        let input = serde_json::to_vec(&request).map_err(|e| {
            DomainError::serialization(format!("Failed to serialize task {}: {}", task.id(), e))
        })?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DomainError::task(format!(
                    "Failed to start worker {}: {}",
                    self.command.program.display(),
                    e
                ))
            })?;

        debug!(task_id = %task.id(), pid = child.id(), "Worker started");

        if let Some(mut stdin) = child.stdin.take() {
            // A worker that exits without reading is judged by its exit status below
            if let Err(e) = stdin.write_all(&input).await {
                debug!(task_id = %task.id(), "Worker closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DomainError::task(format!("Failed to wait for worker: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        match serde_json::from_str::<ExperimentOutcome>(stdout.trim()) {
            Ok(outcome) => Ok(outcome),
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(DomainError::task(format!(
                    "Worker exited with {}: {}",
                    output.status,
                    stderr.trim()
                )))
            }
            Err(e) => Err(DomainError::task(format!(
                "Invalid worker response: {}",
                e
            ))),
        }
    }
}
