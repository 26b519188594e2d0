use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::{CommandName, CommitStatus, PullRequest, Repo};

use crate::ProjectContext;

/// Port for posting reports to the hosting platform.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Posts `comment` on the pull request.
    async fn create_comment(
        &self,
        repo: &Repo,
        pull_num: u64,
        comment: &str,
        command: CommandName,
    ) -> AppResult<()>;
}

/// Port for commit statuses on the pull request head commit.
#[async_trait]
pub trait CommitStatusUpdater: Send + Sync {
    /// Sets the status summarising a whole command.
    async fn update_combined(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()>;

    /// Sets the status of one project's command.
    async fn update_project(
        &self,
        context: &ProjectContext,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()>;
}
