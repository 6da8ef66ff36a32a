//! Worker side of the process boundary
//!
//! A worker reads one [`WorkerRequest`] as JSON from stdin, runs it through an
//! [`ExperimentFunction`] and writes one [`ExperimentOutcome`] as JSON to
//! stdout. Malformed requests are answered with a failed outcome so the
//! parent always gets a structured response.

mod shell;

pub use shell::{ShellExperiment, CONFIG_VAR, DATA_REFERENCE_VAR};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::domain::task::{ExperimentFunction, ExperimentOutcome, WorkerRequest};
use crate::domain::DomainError;

/// Runs one decoded request
pub async fn handle_request(
    function: &dyn ExperimentFunction,
    request: &WorkerRequest,
) -> ExperimentOutcome {
    let task = &request.task;
    debug!(task_id = %task.id(), sandbox = request.sandbox, "Worker running task");

    function
        .execute(
            task.payload(),
            task.data_reference(),
            request.sandbox,
            task.config(),
        )
        .await
}

/// Reads one request from `reader` and writes the outcome to `writer`
pub async fn serve<R, W>(
    function: &dyn ExperimentFunction,
    mut reader: R,
    mut writer: W,
) -> Result<(), DomainError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .await
        .map_err(|e| DomainError::internal(format!("Failed to read worker request: {}", e)))?;

    let outcome = match serde_json::from_str::<WorkerRequest>(&input) {
        Ok(request) => handle_request(function, &request).await,
        Err(e) => {
            warn!("Rejecting malformed worker request: {}", e);
            ExperimentOutcome::failed(format!("Invalid worker request: {}", e))
        }
    };

    let mut output = serde_json::to_vec(&outcome).map_err(|e| {
        DomainError::serialization(format!("Failed to serialize outcome: {}", e))
    })?;
    output.push(b'\n');

    writer
        .write_all(&output)
        .await
        .map_err(|e| DomainError::internal(format!("Failed to write outcome: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| DomainError::internal(format!("Failed to write outcome: {}", e)))
}

/// [`serve`] over the process's stdin and stdout
pub async fn serve_stdio(function: &dyn ExperimentFunction) -> Result<(), DomainError> {
    serve(function, tokio::io::stdin(), tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::ExperimentTask;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    /// Echoes its inputs back as the result
    struct EchoExperiment;

    #[async_trait]
    impl ExperimentFunction for EchoExperiment {
        async fn execute(
            &self,
            payload: &str,
            data_reference: Option<&str>,
            sandbox: bool,
            config: &BTreeMap<String, Value>,
        ) -> ExperimentOutcome {
            ExperimentOutcome::succeeded(json!({
                "payload": payload,
                "data_reference": data_reference,
                "sandbox": sandbox,
                "config": config,
            }))
        }
    }

    async fn roundtrip(input: &[u8]) -> ExperimentOutcome {
        let mut output = Vec::new();
        serve(&EchoExperiment, input, &mut output).await.unwrap();

        assert_eq!(output.last(), Some(&b'\n'));
        serde_json::from_slice(&output).unwrap()
    }

    #[tokio::test]
    async fn test_request_fields_reach_the_experiment() {
        let request = WorkerRequest {
            task: ExperimentTask::new("train")
                .with_data_reference("data/train.csv")
                .with_config("epochs", 5),
            sandbox: true,
        };
        let input = serde_json::to_vec(&request).unwrap();

        let outcome = roundtrip(&input).await;

        assert!(outcome.success);
        let result = outcome.result.unwrap();
        assert_eq!(result["payload"], "train");
        assert_eq!(result["data_reference"], "data/train.csv");
        assert_eq!(result["sandbox"], true);
        assert_eq!(result["config"]["epochs"], 5);
    }

    #[tokio::test]
    async fn test_task_without_optional_fields() {
        let outcome = roundtrip(br#"{"task": {"payload": "run"}}"#).await;

        assert!(outcome.success);
        assert_eq!(outcome.result.unwrap()["sandbox"], false);
    }

    #[tokio::test]
    async fn test_malformed_request_gets_failed_outcome() {
        let outcome = roundtrip(b"{not json").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Invalid worker request"));
    }
}
