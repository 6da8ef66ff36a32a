//! Priority-ordered parallel batch execution

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use crate::domain::cache::duration_millis;
use crate::domain::task::{ExperimentTask, ParallelExecutionResult, TaskRunner};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_task;
use crate::infrastructure::scheduler::{detect_cpu_cores, ResourceAwareScheduler};

/// Invoked once per completed task in async mode
pub type CompletionCallback =
    Arc<dyn Fn(&ParallelExecutionResult) -> anyhow::Result<()> + Send + Sync>;

/// Executor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Pool size; `None` means CPU cores minus one
    pub max_workers: Option<usize>,
    /// Per-task limit; `None` waits indefinitely
    pub task_timeout_secs: Option<u64>,
    /// Millisecond per-task limit, takes precedence over `task_timeout_secs`
    pub task_timeout_ms: Option<u64>,
    /// Run worker processes with a cleared environment in a scratch dir
    pub sandbox: bool,
    /// Serve repeated experiments from the experiment cache class
    pub cache_results: bool,
    /// Worker executable; `None` re-runs this binary with `worker`
    pub worker_program: Option<String>,
    /// Arguments for `worker_program`
    pub worker_args: Vec<String>,
}

impl ExecutorConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = Some(duration_millis(timeout));
        self.task_timeout_secs = None;
        self
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms
            .map(Duration::from_millis)
            .or_else(|| self.task_timeout_secs.map(Duration::from_secs))
    }
}

/// Runs batches of tasks over a bounded pool
///
/// Tasks are dispatched in descending priority (ties keep submission
/// order) and collected as they finish. Every submitted task yields
/// exactly one result; errors, panics and timeouts become failed results.
#[derive(Clone)]
pub struct ParallelExecutor {
    runner: Arc<dyn TaskRunner>,
    max_workers: usize,
    task_timeout: Option<Duration>,
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("max_workers", &self.max_workers)
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

impl ParallelExecutor {
    pub fn new(runner: Arc<dyn TaskRunner>, config: &ExecutorConfig) -> Self {
        let max_workers = config
            .max_workers
            .unwrap_or_else(|| detect_cpu_cores().saturating_sub(1))
            .max(1);

        Self {
            runner,
            max_workers,
            task_timeout: config.task_timeout(),
        }
    }

    /// Pool sized by the scheduler's current recommendation
    pub fn from_scheduler(
        runner: Arc<dyn TaskRunner>,
        scheduler: &ResourceAwareScheduler,
        config: &ExecutorConfig,
    ) -> Self {
        let workers = scheduler.recommended_workers();
        info!(workers, "Sizing executor from scheduler");

        Self::new(runner, &config.clone().with_max_workers(workers))
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs every task and returns one result per task, in completion order
    pub async fn execute_batch(&self, tasks: Vec<ExperimentTask>) -> Vec<ParallelExecutionResult> {
        self.run_batch(tasks, None).await
    }

    /// Starts the batch on a dedicated driver thread with its own runtime
    ///
    /// The caller is never blocked and needs no runtime of its own. The
    /// callback, if any, sees each result as it completes; its errors and
    /// panics are logged and otherwise ignored.
    pub fn execute_batch_async(
        &self,
        tasks: Vec<ExperimentTask>,
        callback: Option<CompletionCallback>,
    ) -> Result<BatchHandle, DomainError> {
        let executor = self.clone();
        let (tx, rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("batch-driver".to_string())
            .spawn(move || {
                // Built here so it is also dropped here, outside any async context
                let results = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(executor.max_workers)
                    .thread_name("batch-worker")
                    .enable_all()
                    .build()
                    .map(|runtime| runtime.block_on(executor.run_batch(tasks, callback)))
                    .map_err(|e| {
                        DomainError::internal(format!("Failed to start batch runtime: {}", e))
                    });
                let _ = tx.send(results);
            })
            .map_err(|e| DomainError::internal(format!("Failed to start batch driver: {}", e)))?;

        Ok(BatchHandle {
            thread,
            results: rx,
        })
    }

    async fn run_batch(
        &self,
        mut tasks: Vec<ExperimentTask>,
        callback: Option<CompletionCallback>,
    ) -> Vec<ParallelExecutionResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        // Stable, so equal priorities keep submission order
        tasks.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let mut expected: HashMap<String, usize> = HashMap::new();
        for task in &tasks {
            *expected.entry(task.id().to_string()).or_default() += 1;
        }

        info!(total, max_workers = self.max_workers, "Starting batch");
        let batch_start = Instant::now();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            tasks,
            self.runner.clone(),
            Arc::new(Semaphore::new(self.max_workers)),
            self.task_timeout,
            tx,
        ));

        let mut results = Vec::with_capacity(total);
        let mut failed = 0;

        while let Some(result) = rx.recv().await {
            if !result.success {
                failed += 1;
                warn!(
                    task_id = %result.task_id,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Task failed"
                );
            }
            record_task(result.success, result.execution_time);

            if let Some(callback) = &callback {
                notify(callback, &result);
            }

            if let Some(count) = expected.get_mut(&result.task_id) {
                *count = count.saturating_sub(1);
            }
            results.push(result);

            info!(
                completed = results.len(),
                failed,
                remaining = total.saturating_sub(results.len()),
                "Batch progress"
            );
        }

        if let Err(e) = dispatcher.await {
            error!("Batch dispatcher stopped early: {}", e);
        }

        // Tasks whose worker vanished without reporting still get a result
        for (task_id, missing) in expected {
            for _ in 0..missing {
                let result = ParallelExecutionResult::failure(
                    task_id.clone(),
                    "task finished without reporting a result",
                    Utc::now(),
                    Duration::ZERO,
                );
                if let Some(callback) = &callback {
                    notify(callback, &result);
                }
                results.push(result);
            }
        }

        let elapsed = batch_start.elapsed();
        info!(
            total,
            failed = results.iter().filter(|r| !r.success).count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Batch finished"
        );

        results
    }
}

async fn dispatch(
    tasks: Vec<ExperimentTask>,
    runner: Arc<dyn TaskRunner>,
    semaphore: Arc<Semaphore>,
    timeout: Option<Duration>,
    tx: mpsc::UnboundedSender<ParallelExecutionResult>,
) {
    for task in tasks {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        debug!(task_id = %task.id(), priority = task.priority(), "Dispatching task");

        let runner = runner.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = run_task(runner.as_ref(), &task, timeout).await;
            drop(permit);
            // The collector only goes away once every sender is dropped
            let _ = tx.send(result);
        });
    }
}

async fn run_task(
    runner: &dyn TaskRunner,
    task: &ExperimentTask,
    timeout: Option<Duration>,
) -> ParallelExecutionResult {
    let started_at = Utc::now();
    let start = Instant::now();

    let attempt = AssertUnwindSafe(async { runner.run(task).await }).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return ParallelExecutionResult::failure(
                    task.id(),
                    format!("timed out after {:?}", limit),
                    started_at,
                    start.elapsed(),
                );
            }
        },
        None => attempt.await,
    };

    match outcome {
        Ok(Ok(outcome)) => {
            ParallelExecutionResult::from_outcome(task.id(), outcome, started_at, start.elapsed())
        }
        Ok(Err(e)) => {
            ParallelExecutionResult::failure(task.id(), e.to_string(), started_at, start.elapsed())
        }
        Err(panic) => ParallelExecutionResult::failure(
            task.id(),
            format!("task panicked: {}", panic_message(panic.as_ref())),
            started_at,
            start.elapsed(),
        ),
    }
}

fn notify(callback: &CompletionCallback, result: &ParallelExecutionResult) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(task_id = %result.task_id, "Completion callback failed: {:#}", e),
        Err(panic) => error!(
            task_id = %result.task_id,
            "Completion callback panicked: {}",
            panic_message(panic.as_ref())
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A batch running on its driver thread
#[derive(Debug)]
pub struct BatchHandle {
    thread: std::thread::JoinHandle<()>,
    results: oneshot::Receiver<Result<Vec<ParallelExecutionResult>, DomainError>>,
}

impl BatchHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for every task to complete
    pub async fn wait(self) -> Result<Vec<ParallelExecutionResult>, DomainError> {
        self.results.await.map_err(|_| driver_lost())?
    }

    /// [`BatchHandle::wait`] for callers outside an async context
    ///
    /// Panics if called from within an async runtime.
    pub fn wait_blocking(self) -> Result<Vec<ParallelExecutionResult>, DomainError> {
        self.results.blocking_recv().map_err(|_| driver_lost())?
    }
}

fn driver_lost() -> DomainError {
    DomainError::internal("Batch driver stopped without reporting results")
}
