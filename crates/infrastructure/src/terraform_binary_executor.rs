use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use plangate_application::{JobMessageSender, ProjectContext, TerraformExecutor};
use plangate_core::{AppError, AppResult};
use plangate_domain::ToolVersion;
use tracing::{debug, info};

use crate::shell_process::run_shell;

/// Runs the tool binary matching a version, streaming its output to the job.
///
/// A binary named `terraform{version}` inside the configured directory wins;
/// otherwise `terraform` is resolved from `PATH`.
#[derive(Clone)]
pub struct TerraformBinaryExecutor {
    binary_dir: Option<PathBuf>,
    job_sender: Arc<dyn JobMessageSender>,
    timeout: Duration,
}

impl TerraformBinaryExecutor {
    /// Creates an executor. `binary_dir` holds version-suffixed binaries.
    #[must_use]
    pub fn new(
        binary_dir: Option<PathBuf>,
        job_sender: Arc<dyn JobMessageSender>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary_dir,
            job_sender,
            timeout,
        }
    }

    fn binary_for(&self, version: &ToolVersion) -> String {
        self.binary_dir
            .as_ref()
            .map(|dir| dir.join(format!("terraform{version}")))
            .filter(|candidate| candidate.is_file())
            .map_or_else(
                || "terraform".to_owned(),
                |candidate| shell_quote(&candidate),
            )
    }
}

#[async_trait]
impl TerraformExecutor for TerraformBinaryExecutor {
    async fn run_command_with_version(
        &self,
        context: &ProjectContext,
        path: &Path,
        args: &[String],
        envs: &HashMap<String, String>,
        version: &ToolVersion,
        workspace: &str,
    ) -> AppResult<String> {
        let command = format!("{} {}", self.binary_for(version), args.join(" "));

        let mut environment = HashMap::from([
            ("TF_IN_AUTOMATION".to_owned(), "true".to_owned()),
            ("ATLANTIS_TERRAFORM_VERSION".to_owned(), version.to_string()),
            ("WORKSPACE".to_owned(), workspace.to_owned()),
        ]);
        environment.extend(envs.iter().map(|(key, value)| (key.clone(), value.clone())));

        debug!(command = %command, "running tool command");
        let output = run_shell(&command, path, &environment, self.timeout, |line| {
            self.job_sender.send(context, line, false);
        })
        .await?;

        if !output.success() {
            info!(exit_code = output.code(), command = %command, "tool command failed");
            return Err(AppError::Execution(format!(
                "running {command:?} in {:?}: exit status {}: \n{}",
                path.display().to_string(),
                output.code(),
                output.output
            )));
        }

        Ok(output.output)
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
