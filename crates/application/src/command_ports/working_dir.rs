use std::path::{Path, PathBuf};

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::{PullRequest, Repo};

/// Port over cloned pull request checkouts.
#[async_trait]
pub trait WorkingDir: Send + Sync {
    /// Returns the checkout of `pull` for `workspace`.
    ///
    /// Fails with [`plangate_core::AppError::NotFound`] when it was never cloned.
    async fn get_working_dir(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<PathBuf>;

    /// Returns whether the base branch moved ahead of the checkout in `clone_dir`.
    async fn has_diverged(&self, clone_dir: &Path) -> bool;

    /// Deletes the checkout of `pull` for `workspace`, discarding its plans.
    async fn delete_for_workspace(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<()>;
}
