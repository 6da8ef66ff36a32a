//! Experiment task and result records

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ExperimentTask
// ============================================================================

fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// A unit of work submitted to the executor
///
/// Tasks are plain data so they can cross the worker process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentTask {
    #[serde(default = "new_task_id")]
    id: String,
    payload: String,
    #[serde(default)]
    data_reference: Option<String>,
    #[serde(default)]
    config: BTreeMap<String, serde_json::Value>,
    /// Higher runs sooner
    #[serde(default)]
    priority: i32,
}

impl ExperimentTask {
    /// Creates a task with a fresh UUID
    pub fn new(payload: impl Into<String>) -> Self {
        Self::with_id(new_task_id(), payload)
    }

    pub fn with_id(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            data_reference: None,
            config: BTreeMap::new(),
            priority: 0,
        }
    }

    pub fn with_data_reference(mut self, data_reference: impl Into<String>) -> Self {
        self.data_reference = Some(data_reference.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn data_reference(&self) -> Option<&str> {
        self.data_reference.as_deref()
    }

    pub fn config(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.config
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

// ============================================================================
// Worker messages
// ============================================================================

/// What the worker receives on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub task: ExperimentTask,
    #[serde(default)]
    pub sandbox: bool,
}

/// What an experiment function returns, and what the worker writes to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExperimentOutcome {
    pub fn succeeded(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// ParallelExecutionResult
// ============================================================================

/// Outcome of one task in a batch; produced exactly once per task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelExecutionResult {
    pub task_id: String,
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub execution_time: Duration,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ParallelExecutionResult {
    /// Builds the record for a task that ran to an outcome
    pub fn from_outcome(
        task_id: impl Into<String>,
        outcome: ExperimentOutcome,
        started_at: DateTime<Utc>,
        execution_time: Duration,
    ) -> Self {
        let error = match (outcome.success, outcome.error) {
            (true, error) => error,
            (false, Some(error)) => Some(error),
            (false, None) => Some("experiment reported failure".to_string()),
        };

        Self {
            task_id: task_id.into(),
            success: outcome.success,
            result: outcome.result,
            execution_time,
            error,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Builds the record for a task that raised, timed out or never ran
    pub fn failure(
        task_id: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        execution_time: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            result: None,
            execution_time,
            error: Some(error.into()),
            started_at,
            completed_at: Utc::now(),
        }
    }
}

// ============================================================================
// BatchSummary
// ============================================================================

/// Per-batch report for operational tooling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration: Duration,
    pub average_duration: Duration,
}

impl BatchSummary {
    pub fn from_results(results: &[ParallelExecutionResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let total_duration: Duration = results.iter().map(|r| r.execution_time).sum();

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            total_duration,
            average_duration: total_duration / results.len() as u32,
        }
    }
}
