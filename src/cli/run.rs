//! Run command - executes a batch of experiment tasks

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::domain::cache::CacheClass;
use crate::domain::task::{BatchSummary, ExperimentTask, ParallelExecutionResult, TaskRunner};
use crate::infrastructure::cache::CacheRegistry;
use crate::infrastructure::executor::{
    CachedTaskRunner, ParallelExecutor, ProcessTaskRunner, WorkerCommand,
};
use crate::infrastructure::scheduler::ResourceAwareScheduler;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON file holding an array of tasks
    pub tasks: PathBuf,

    /// Worker pool size; defaults to the scheduler's recommendation
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-task timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Run workers with a cleared environment in a scratch directory
    #[arg(long)]
    pub sandbox: bool,

    /// Reuse outcomes of identical earlier experiments
    #[arg(long)]
    pub cache: bool,
}

#[derive(Serialize)]
struct RunReport {
    summary: BatchSummary,
    results: Vec<ParallelExecutionResult>,
}

/// Execute the batch and print a JSON report
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let (config, metrics) = super::bootstrap();

    let raw = tokio::fs::read_to_string(&args.tasks)
        .await
        .with_context(|| format!("Failed to read {}", args.tasks.display()))?;
    let tasks: Vec<ExperimentTask> =
        serde_json::from_str(&raw).context("Tasks file must be a JSON array of tasks")?;

    let mut executor_config = config.executor.clone();
    if let Some(timeout) = args.timeout {
        executor_config = executor_config.with_task_timeout(Duration::from_secs(timeout));
    }
    executor_config.sandbox |= args.sandbox;
    executor_config.cache_results |= args.cache;

    let command = WorkerCommand::from_config(&executor_config)?;
    let mut runner: Arc<dyn TaskRunner> =
        Arc::new(ProcessTaskRunner::new(command).with_sandbox(executor_config.sandbox));

    if executor_config.cache_results {
        let registry = CacheRegistry::new(config.cache.registry_config())?;
        runner = Arc::new(CachedTaskRunner::new(
            runner,
            registry.get_cache(CacheClass::Experiment),
        ));
    }

    let executor = match args.workers.or(executor_config.max_workers) {
        Some(workers) => {
            ParallelExecutor::new(runner, &executor_config.clone().with_max_workers(workers))
        }
        None => {
            let scheduler = ResourceAwareScheduler::new(config.scheduler.clone());
            ParallelExecutor::from_scheduler(runner, &scheduler, &executor_config)
        }
    };

    info!(
        tasks = tasks.len(),
        workers = executor.max_workers(),
        "Running batch"
    );

    let results = executor.execute_batch(tasks).await;
    let report = RunReport {
        summary: BatchSummary::from_results(&results),
        results,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    Ok(())
}
