use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use plangate_application::{CustomStepRunner, JobMessageSender, ProjectContext};
use plangate_core::{AppError, AppResult};
use plangate_domain::ToolVersion;
use tracing::debug;

use crate::shell_process::run_shell;

/// Runs workflow `run` steps with `sh -c` in the project directory.
#[derive(Clone)]
pub struct ShellCustomStepRunner {
    job_sender: Arc<dyn JobMessageSender>,
    default_version: ToolVersion,
    timeout: Duration,
}

impl ShellCustomStepRunner {
    /// Creates a runner streaming to `job_sender` and killing commands after `timeout`.
    #[must_use]
    pub fn new(
        job_sender: Arc<dyn JobMessageSender>,
        default_version: ToolVersion,
        timeout: Duration,
    ) -> Self {
        Self {
            job_sender,
            default_version,
            timeout,
        }
    }
}

#[async_trait]
impl CustomStepRunner for ShellCustomStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        command: &str,
        path: &Path,
        envs: &HashMap<String, String>,
        stream_output: bool,
    ) -> AppResult<String> {
        let mut environment = project_environment(context, path, &self.default_version);
        environment.extend(envs.iter().map(|(key, value)| (key.clone(), value.clone())));

        debug!(command, "running custom step");
        let output = run_shell(command, path, &environment, self.timeout, |line| {
            if stream_output {
                self.job_sender.send(context, line, false);
            }
        })
        .await?;

        if !output.success() {
            return Err(AppError::Execution(format!(
                "exit status {}: running {command:?} in {:?}: \n{}",
                output.code(),
                path.display().to_string(),
                output.output
            )));
        }

        Ok(output.output)
    }
}

/// Variables every custom command sees, before step-computed values.
fn project_environment(
    context: &ProjectContext,
    path: &Path,
    default_version: &ToolVersion,
) -> HashMap<String, String> {
    let version = context
        .terraform_version
        .as_ref()
        .unwrap_or(default_version);
    let project_name = context.project_name.clone().unwrap_or_default();

    [
        ("WORKSPACE", context.workspace.clone()),
        ("ATLANTIS_TERRAFORM_VERSION", version.to_string()),
        ("DIR", path.display().to_string()),
        (
            "PLANFILE",
            path.join(context.plan_file_name()).display().to_string(),
        ),
        (
            "SHOWFILE",
            path.join(context.show_file_name()).display().to_string(),
        ),
        ("BASE_REPO_NAME", context.base_repo.name.clone()),
        ("BASE_REPO_OWNER", context.base_repo.owner.clone()),
        ("HEAD_REPO_NAME", context.head_repo.name.clone()),
        ("HEAD_REPO_OWNER", context.head_repo.owner.clone()),
        ("HEAD_BRANCH_NAME", context.pull.head_branch.clone()),
        ("HEAD_COMMIT", context.pull.head_commit.clone()),
        ("BASE_BRANCH_NAME", context.pull.base_branch.clone()),
        ("PROJECT_NAME", project_name),
        ("PULL_NUM", context.pull.num.to_string()),
        ("PULL_URL", context.pull.url.clone()),
        ("PULL_AUTHOR", context.pull.author.clone()),
        ("REPO_REL_DIR", context.repo_rel_dir.clone()),
        ("USER_NAME", context.user.username.clone()),
        ("COMMENT_ARGS", context.escaped_comment_args.join(",")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_owned(), value))
    .collect()
}
