use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use plangate_application::WorkingDir;
use plangate_core::{AppError, AppResult};
use plangate_domain::{PullRequest, Repo};
use tracing::{info, warn};

use crate::shell_process::run_shell;

const DIVERGENCE_CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Checkouts under `{data_dir}/repos/{owner}/{repo}/{pull}/{workspace}`.
///
/// Cloning happens outside this process; a missing checkout reports
/// [`AppError::NotFound`].
#[derive(Debug, Clone)]
pub struct LocalWorkingDir {
    data_dir: PathBuf,
}

impl LocalWorkingDir {
    /// Creates a working dir rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn clone_dir(&self, repo: &Repo, pull: &PullRequest, workspace: &str) -> AppResult<PathBuf> {
        if workspace.is_empty() || workspace.contains("..") || workspace.contains('/') {
            return Err(AppError::Validation(format!(
                "workspace '{workspace}' is not a valid directory name"
            )));
        }

        Ok(self
            .data_dir
            .join("repos")
            .join(&repo.full_name)
            .join(pull.num.to_string())
            .join(workspace))
    }
}

#[async_trait]
impl WorkingDir for LocalWorkingDir {
    async fn get_working_dir(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<PathBuf> {
        let clone_dir = self.clone_dir(repo, pull, workspace)?;
        let exists = tokio::fs::try_exists(&clone_dir).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to inspect working dir {}: {error}",
                clone_dir.display()
            ))
        })?;

        if !exists {
            return Err(AppError::NotFound(format!(
                "working dir {} does not exist",
                clone_dir.display()
            )));
        }

        Ok(clone_dir)
    }

    async fn has_diverged(&self, clone_dir: &Path) -> bool {
        let result = run_shell(
            "git remote update >/dev/null && git status --untracked-files=no",
            clone_dir,
            &HashMap::new(),
            DIVERGENCE_CHECK_TIMEOUT,
            |_| {},
        )
        .await;

        match result {
            Ok(output) if output.success() => output.output.contains("have diverged"),
            Ok(output) => {
                warn!(exit_code = output.code(), "divergence check failed");
                false
            }
            Err(error) => {
                warn!(error = %error, "divergence check failed");
                false
            }
        }
    }

    async fn delete_for_workspace(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<()> {
        let clone_dir = self.clone_dir(repo, pull, workspace)?;
        match tokio::fs::remove_dir_all(&clone_dir).await {
            Ok(()) => {
                info!(path = %clone_dir.display(), "deleted working dir");
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AppError::Internal(format!(
                "failed to delete working dir {}: {error}",
                clone_dir.display()
            ))),
        }
    }
}
