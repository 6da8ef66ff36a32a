//! Shell-script experiments

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::domain::task::{ExperimentFunction, ExperimentOutcome};

/// Holds the task's data reference, when it has one
pub const DATA_REFERENCE_VAR: &str = "EXPERIMENT_DATA_REFERENCE";

/// Holds the task config as a JSON object
pub const CONFIG_VAR: &str = "EXPERIMENT_CONFIG";

/// Runs the payload as a `sh -c` script
///
/// The result is `{stdout, stderr, exit_code}`, with stdout parsed as JSON
/// when possible. In sandbox mode the script sees only `PATH` plus the
/// experiment variables and runs in a throwaway directory.
#[derive(Debug, Clone)]
pub struct ShellExperiment {
    shell: PathBuf,
}

impl ShellExperiment {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExperiment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExperimentFunction for ShellExperiment {
    async fn execute(
        &self,
        payload: &str,
        data_reference: Option<&str>,
        sandbox: bool,
        config: &BTreeMap<String, Value>,
    ) -> ExperimentOutcome {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(payload)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let scratch = if sandbox {
            command.env_clear();
            if let Ok(path) = std::env::var("PATH") {
                command.env("PATH", path);
            }

            match tempfile::Builder::new()
                .prefix("research-cache-sandbox-")
                .tempdir()
            {
                Ok(dir) => {
                    command.current_dir(dir.path());
                    Some(dir)
                }
                Err(e) => {
                    return ExperimentOutcome::failed(format!(
                        "Failed to create sandbox directory: {}",
                        e
                    ))
                }
            }
        } else {
            None
        };

        if let Some(reference) = data_reference {
            command.env(DATA_REFERENCE_VAR, reference);
        }
        command.env(CONFIG_VAR, json!(config).to_string());

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => {
                return ExperimentOutcome::failed(format!(
                    "Failed to run {}: {}",
                    self.shell.display(),
                    e
                ))
            }
        };
        drop(scratch);

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code();

        debug!(?exit_code, sandbox, "Shell experiment finished");

        let parsed: Value = serde_json::from_str(&stdout).unwrap_or_else(|_| Value::String(stdout));
        let result = json!({
            "stdout": parsed,
            "stderr": stderr,
            "exit_code": exit_code,
        });

        if output.status.success() {
            return ExperimentOutcome::succeeded(result);
        }

        let status = exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());

        ExperimentOutcome {
            success: false,
            result: Some(result),
            error: Some(format!("exit status {}: {}", status, stderr)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn run(
        payload: &str,
        data_reference: Option<&str>,
        sandbox: bool,
        config: &BTreeMap<String, Value>,
    ) -> ExperimentOutcome {
        ShellExperiment::new()
            .execute(payload, data_reference, sandbox, config)
            .await
    }

    #[tokio::test]
    async fn test_json_stdout_is_parsed() {
        let outcome = run(r#"echo '{"accuracy": 0.93}'"#, None, false, &BTreeMap::new()).await;

        assert!(outcome.success);
        let result = outcome.result.unwrap();
        assert_eq!(result["stdout"]["accuracy"], 0.93);
        assert_eq!(result["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_plain_stdout_stays_text() {
        let outcome = run("echo done", None, false, &BTreeMap::new()).await;

        assert_eq!(outcome.result.unwrap()["stdout"], "done");
    }

    #[tokio::test]
    async fn test_failing_script() {
        let outcome = run("echo 'bad input' >&2; exit 2", None, false, &BTreeMap::new()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("exit status 2: bad input"));
        assert_eq!(outcome.result.unwrap()["exit_code"], 2);
    }

    #[tokio::test]
    async fn test_environment_carries_task_data() {
        let mut config = BTreeMap::new();
        config.insert("epochs".to_string(), json!(3));

        let outcome = run(
            r#"echo "$EXPERIMENT_DATA_REFERENCE|$EXPERIMENT_CONFIG""#,
            Some("s3://bucket/data.csv"),
            false,
            &config,
        )
        .await;

        assert_eq!(
            outcome.result.unwrap()["stdout"],
            r#"s3://bucket/data.csv|{"epochs":3}"#
        );
    }

    #[tokio::test]
    async fn test_sandbox_clears_environment_and_directory() {
        // SAFETY: tests in this module do not read this variable concurrently
        unsafe { std::env::set_var("RESEARCH_CACHE_SANDBOX_LEAK", "leaked") };

        let outcome = run(
            r#"echo "${RESEARCH_CACHE_SANDBOX_LEAK:-clean}|$(pwd)""#,
            None,
            true,
            &BTreeMap::new(),
        )
        .await;

        let stdout = outcome.result.unwrap()["stdout"].as_str().unwrap().to_string();
        let (env_state, dir) = stdout.split_once('|').unwrap();
        assert_eq!(env_state, "clean");
        assert!(dir.contains("research-cache-sandbox-"));
        assert!(!std::path::Path::new(dir).exists());
    }
}
