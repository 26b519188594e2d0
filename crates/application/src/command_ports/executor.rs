use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;

use crate::ProjectContext;

/// Runs the infrastructure tool binary of one version.
#[async_trait]
pub trait TerraformExecutor: Send + Sync {
    /// Runs `args` against the tool in `path` and returns the combined output.
    ///
    /// Non-zero exits return [`plangate_core::AppError::Execution`] carrying the output.
    async fn run_command_with_version(
        &self,
        context: &ProjectContext,
        path: &Path,
        args: &[String],
        envs: &HashMap<String, String>,
        version: &ToolVersion,
        workspace: &str,
    ) -> AppResult<String>;
}

/// Runs an arbitrary shell command for a workflow `run` step.
#[async_trait]
pub trait CustomStepRunner: Send + Sync {
    /// Runs `command` in `path` with the project environment and `envs` merged in.
    ///
    /// When `stream_output` is set every output line is forwarded to the job output.
    async fn run(
        &self,
        context: &ProjectContext,
        command: &str,
        path: &Path,
        envs: &HashMap<String, String>,
        stream_output: bool,
    ) -> AppResult<String>;
}
