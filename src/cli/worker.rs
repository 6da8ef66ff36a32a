//! Worker command - serves one experiment over stdin/stdout

use crate::infrastructure::worker::{serve_stdio, ShellExperiment};

/// Run the worker protocol once
pub async fn run() -> anyhow::Result<()> {
    super::bootstrap();

    serve_stdio(&ShellExperiment::new()).await?;

    Ok(())
}
