use std::collections::BTreeSet;
use std::sync::Arc;

use plangate_core::{AppError, AppResult};
use plangate_domain::{CommandName, CommandResult, CommitStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{
    CommandRequest, CommitStatusUpdater, Locker, MarkdownRenderer, ProjectCommandBuilder,
    ProjectCommandRunner, ProjectContext, RendererSettings, RepoAllowlist, ResultAggregator,
    VcsClient, WorkingDir,
};

/// Comment posted after every lock of a pull request was released.
pub const UNLOCKED_MESSAGE: &str =
    "All Atlantis locks for this PR have been unlocked and plans discarded";

/// Comment posted when releasing the locks of a pull request failed.
pub const UNLOCK_FAILED_MESSAGE: &str = "Failed to delete PR locks";

/// Scheduling and merge policy of the command runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRunnerSettings {
    /// Run plan and policy check projects concurrently.
    pub parallel_plan: bool,
    /// Run apply projects concurrently.
    pub parallel_apply: bool,
    /// Upper bound on concurrently running projects.
    pub parallel_pool_size: usize,
    /// Discard every plan of the pull request when one project fails to plan.
    pub automerge: bool,
}

impl Default for CommandRunnerSettings {
    fn default() -> Self {
        Self {
            parallel_plan: false,
            parallel_apply: false,
            parallel_pool_size: 15,
            automerge: false,
        }
    }
}

/// What a command produced: the aggregated result and the comment posted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// Aggregated result across projects.
    pub result: CommandResult,
    /// Markdown posted to the pull request.
    pub comment: String,
}

/// Runs one pull request command across all of its projects.
#[derive(Clone)]
pub struct CommandRunner {
    builder: Arc<dyn ProjectCommandBuilder>,
    project_runner: ProjectCommandRunner,
    locker: Locker,
    working_dir: Arc<dyn WorkingDir>,
    vcs_client: Arc<dyn VcsClient>,
    status_updater: Arc<dyn CommitStatusUpdater>,
    renderer: MarkdownRenderer,
    allowlist: RepoAllowlist,
    settings: CommandRunnerSettings,
}

impl CommandRunner {
    /// Creates a runner that allows every repository and runs projects serially.
    #[must_use]
    pub fn new(
        builder: Arc<dyn ProjectCommandBuilder>,
        project_runner: ProjectCommandRunner,
        locker: Locker,
        working_dir: Arc<dyn WorkingDir>,
        vcs_client: Arc<dyn VcsClient>,
        status_updater: Arc<dyn CommitStatusUpdater>,
    ) -> Self {
        Self {
            builder,
            project_runner,
            locker,
            working_dir,
            vcs_client,
            status_updater,
            renderer: MarkdownRenderer::new(RendererSettings::default()),
            allowlist: RepoAllowlist::allow_all(),
            settings: CommandRunnerSettings::default(),
        }
    }

    /// Replaces the report renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: MarkdownRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Restricts the repositories commands may run for.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: RepoAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Replaces scheduling and merge settings.
    #[must_use]
    pub fn with_settings(mut self, settings: CommandRunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs `command` for the request and posts the report.
    ///
    /// Only a failure to post the comment is returned as an error. Everything
    /// else ends up in the report.
    pub async fn run(
        &self,
        command: CommandName,
        request: &CommandRequest,
    ) -> AppResult<CommandReport> {
        info!(
            repo = %request.base_repo.full_name,
            pull = request.pull.num,
            command = %command,
            "running command"
        );

        let report = match self.allowlist.check(&request.base_repo) {
            Ok(()) if command == CommandName::Unlock => self.unlock(request).await,
            Ok(()) => self.run_projects(command, request).await,
            Err(error) => {
                warn!(repo = %request.base_repo.allowlist_id(), "repository is not allowlisted");
                rejected(error)
            }
        };

        self.vcs_client
            .create_comment(
                &request.base_repo,
                request.pull.num,
                report.comment.as_str(),
                command,
            )
            .await?;

        Ok(report)
    }

    async fn unlock(&self, request: &CommandRequest) -> CommandReport {
        match self.delete_pull_locks(request).await {
            Ok(()) => CommandReport {
                result: CommandResult::default(),
                comment: UNLOCKED_MESSAGE.to_owned(),
            },
            Err(error) => {
                warn!(error = %error, "failed to delete pull request locks");
                CommandReport {
                    result: CommandResult::from_error(error.to_string()),
                    comment: UNLOCK_FAILED_MESSAGE.to_owned(),
                }
            }
        }
    }

    async fn run_projects(&self, command: CommandName, request: &CommandRequest) -> CommandReport {
        self.update_combined(request, command, CommitStatus::Pending)
            .await;

        let mut result = match self.builder.build_commands(command, request).await {
            Ok(contexts) => self.execute(command, contexts).await,
            Err(error) => {
                warn!(error = %error, "failed to build project commands");
                CommandResult::from_error(error.to_string())
            }
        };

        if self.settings.automerge && command == CommandName::Plan && result.has_errors() {
            match self.delete_pull_locks(request).await {
                Ok(()) => result.plans_deleted = true,
                Err(error) => warn!(error = %error, "failed to discard plans for automerge"),
            }
        }

        self.update_combined(request, command, result.commit_status())
            .await;

        let log = run_log(&result);
        let comment = self.renderer.render(
            &result,
            command,
            log.as_str(),
            request.verbose,
            request.base_repo.vcs_host,
        );

        CommandReport { result, comment }
    }

    async fn execute(&self, command: CommandName, contexts: Vec<ProjectContext>) -> CommandResult {
        let parallel = match command {
            CommandName::Plan | CommandName::PolicyCheck => self.settings.parallel_plan,
            CommandName::Apply => self.settings.parallel_apply,
            CommandName::Version | CommandName::Unlock => false,
        };

        if parallel && contexts.len() > 1 {
            self.execute_parallel(contexts).await
        } else {
            self.execute_serial(contexts).await
        }
    }

    async fn execute_serial(&self, contexts: Vec<ProjectContext>) -> CommandResult {
        let mut aggregator = ResultAggregator::new(&contexts);
        for (index, context) in contexts.iter().enumerate() {
            aggregator.record(index, self.project_runner.run(context).await);
        }

        aggregator.finish()
    }

    async fn execute_parallel(&self, contexts: Vec<ProjectContext>) -> CommandResult {
        let mut aggregator = ResultAggregator::new(&contexts);
        let semaphore = Arc::new(Semaphore::new(self.settings.parallel_pool_size.max(1)));
        let mut workers = JoinSet::new();

        for (index, context) in contexts.into_iter().enumerate() {
            let runner = self.project_runner.clone();
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, runner.run(&context).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, result)) => aggregator.record(index, result),
                Err(error) => warn!(error = %error, "project worker did not complete"),
            }
        }

        aggregator.finish()
    }

    /// Releases every lock of the pull request and deletes the checkouts they covered.
    async fn delete_pull_locks(&self, request: &CommandRequest) -> AppResult<()> {
        let released = self
            .locker
            .unlock_by_pull(request.base_repo.full_name.as_str(), request.pull.num)
            .await?;

        let workspaces = released
            .iter()
            .map(|lock| lock.workspace.as_str())
            .collect::<BTreeSet<_>>();

        for workspace in workspaces {
            self.working_dir
                .delete_for_workspace(&request.base_repo, &request.pull, workspace)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to delete working dir for workspace {workspace}: {error}"
                    ))
                })?;
        }

        Ok(())
    }

    async fn update_combined(
        &self,
        request: &CommandRequest,
        command: CommandName,
        status: CommitStatus,
    ) {
        if let Err(error) = self
            .status_updater
            .update_combined(&request.base_repo, &request.pull, command, status)
            .await
        {
            warn!(error = %error, status = %status, "failed to update commit status");
        }
    }
}

fn rejected(error: AppError) -> CommandReport {
    let message = match error {
        AppError::Forbidden(message) => message,
        other => other.to_string(),
    };

    CommandReport {
        result: CommandResult::from_failure(message.clone()),
        comment: message,
    }
}

/// One line per project with its final status, shown in verbose reports.
fn run_log(result: &CommandResult) -> String {
    result
        .project_results
        .iter()
        .map(|project| {
            format!(
                "{} dir: {} workspace: {}: {}\n",
                project.command,
                project.repo_rel_dir,
                project.workspace,
                project.commit_status()
            )
        })
        .collect()
}
