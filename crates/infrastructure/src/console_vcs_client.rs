use async_trait::async_trait;
use plangate_application::{CommitStatusUpdater, ProjectContext, VcsClient};
use plangate_core::AppResult;
use plangate_domain::{CommandName, CommitStatus, PullRequest, Repo};
use tracing::info;

/// VCS adapter that only logs comments and statuses.
#[derive(Debug, Clone, Default)]
pub struct ConsoleVcsClient;

#[async_trait]
impl VcsClient for ConsoleVcsClient {
    async fn create_comment(
        &self,
        repo: &Repo,
        pull_num: u64,
        comment: &str,
        command: CommandName,
    ) -> AppResult<()> {
        info!(
            repo = %repo.full_name,
            pull = pull_num,
            command = %command,
            comment_lines = comment.lines().count(),
            "comment posted"
        );

        Ok(())
    }
}

#[async_trait]
impl CommitStatusUpdater for ConsoleVcsClient {
    async fn update_combined(
        &self,
        repo: &Repo,
        pull: &PullRequest,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()> {
        info!(
            repo = %repo.full_name,
            pull = pull.num,
            commit = %pull.head_commit,
            status_name = %format!("atlantis/{command}"),
            status = %status,
            "commit status updated"
        );

        Ok(())
    }

    async fn update_project(
        &self,
        context: &ProjectContext,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()> {
        let project = context
            .project_name
            .clone()
            .unwrap_or_else(|| format!("{}/{}", context.repo_rel_dir, context.workspace));

        info!(
            repo = %context.base_repo.full_name,
            pull = context.pull.num,
            commit = %context.pull.head_commit,
            status_name = %format!("atlantis/{command}: {project}"),
            status = %status,
            "project commit status updated"
        );

        Ok(())
    }
}
