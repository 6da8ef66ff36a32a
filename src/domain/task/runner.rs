//! Execution seams on either side of the worker boundary

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ExperimentOutcome, ExperimentTask};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Runs one task to an outcome on behalf of the executor
///
/// An `Err` means the work could not be invoked at all (spawn failure,
/// broken worker protocol); experiment failures are `Ok` outcomes with
/// `success == false`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &ExperimentTask) -> Result<ExperimentOutcome, DomainError>;
}

/// The experiment-execution entry point invoked inside a worker
#[async_trait]
pub trait ExperimentFunction: Send + Sync {
    async fn execute(
        &self,
        payload: &str,
        data_reference: Option<&str>,
        sandbox: bool,
        config: &BTreeMap<String, serde_json::Value>,
    ) -> ExperimentOutcome;
}
