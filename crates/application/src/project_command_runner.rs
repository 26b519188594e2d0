use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plangate_core::{AppError, AppResult};
use plangate_domain::{
    CommandName, CommitStatus, PlanSuccess, PolicyCheckSuccess, ProjectOutcome, ProjectResult,
    ToolVersion, WorkflowStep,
};
use tracing::{Instrument, info, warn};

use crate::step_runners::{
    ApplyStepRunner, DefaultEnvStepRunner, EnvStepRunner, InitStepRunner,
    MinimumVersionStepRunner, PlanStepRunner, PolicyCheckSettings, PolicyCheckStepRunner,
    ShowStepRunner, StepRunner, VersionStepRunner,
};
use crate::{
    CommitStatusUpdater, CustomStepRunner, JobMessageSender, Locker, LockUrlGenerator,
    ProjectContext, ProjectLockResponse, ProjectLocker, TerraformExecutor, WorkingDir,
    WorkingDirLockGuard, WorkingDirLocker,
};

/// Oldest tool version able to render a plan as JSON.
const SHOW_MINIMUM_VERSION: &str = "0.12.0";

/// The runner behind each workflow step type.
#[derive(Clone)]
pub struct StepRunners {
    /// `init` steps.
    pub init: Arc<dyn StepRunner>,
    /// `plan` steps.
    pub plan: Arc<dyn StepRunner>,
    /// `show` steps.
    pub show: Arc<dyn StepRunner>,
    /// `policy_check` steps.
    pub policy_check: Arc<dyn StepRunner>,
    /// `apply` steps.
    pub apply: Arc<dyn StepRunner>,
    /// `version` steps.
    pub version: Arc<dyn StepRunner>,
    /// `run` steps.
    pub run: Arc<dyn CustomStepRunner>,
    /// `env` steps.
    pub env: Arc<dyn EnvStepRunner>,
}

impl StepRunners {
    /// Builds the standard chain. Show and policy checks are gated on the
    /// first tool version with JSON plan output.
    pub fn new(
        executor: Arc<dyn TerraformExecutor>,
        run_step_runner: Arc<dyn CustomStepRunner>,
        default_version: ToolVersion,
        policy_check: PolicyCheckSettings,
    ) -> AppResult<Self> {
        let minimum_version = ToolVersion::parse(SHOW_MINIMUM_VERSION)?;
        let gated = |delegate: Arc<dyn StepRunner>| -> Arc<dyn StepRunner> {
            Arc::new(MinimumVersionStepRunner::new(
                delegate,
                minimum_version.clone(),
                default_version.clone(),
            ))
        };

        Ok(Self {
            init: Arc::new(InitStepRunner::new(
                executor.clone(),
                default_version.clone(),
            )),
            plan: Arc::new(PlanStepRunner::new(
                executor.clone(),
                default_version.clone(),
            )),
            show: gated(Arc::new(ShowStepRunner::new(
                executor.clone(),
                default_version.clone(),
            ))),
            policy_check: gated(Arc::new(PolicyCheckStepRunner::new(
                run_step_runner.clone(),
                policy_check,
            ))),
            apply: Arc::new(ApplyStepRunner::new(
                executor.clone(),
                default_version.clone(),
            )),
            version: Arc::new(VersionStepRunner::new(executor, default_version)),
            env: Arc::new(DefaultEnvStepRunner::new(run_step_runner.clone())),
            run: run_step_runner,
        })
    }
}

/// Runs one command for one project and turns the outcome into a [`ProjectResult`].
///
/// Never returns an error: every failure becomes a `Failure` or `Error` outcome.
#[derive(Clone)]
pub struct ProjectCommandRunner {
    steps: StepRunners,
    working_dir: Arc<dyn WorkingDir>,
    working_dir_locker: WorkingDirLocker,
    project_locker: ProjectLocker,
    lock_url_generator: LockUrlGenerator,
    job_sender: Arc<dyn JobMessageSender>,
    status_updater: Arc<dyn CommitStatusUpdater>,
}

impl ProjectCommandRunner {
    /// Creates a project command runner.
    #[must_use]
    pub fn new(
        steps: StepRunners,
        working_dir: Arc<dyn WorkingDir>,
        locker: Locker,
        lock_url_generator: LockUrlGenerator,
        job_sender: Arc<dyn JobMessageSender>,
        status_updater: Arc<dyn CommitStatusUpdater>,
    ) -> Self {
        Self {
            steps,
            working_dir,
            working_dir_locker: WorkingDirLocker::new(),
            project_locker: ProjectLocker::new(locker),
            lock_url_generator,
            job_sender,
            status_updater,
        }
    }

    /// Shares a working directory locker with other runners in the process.
    #[must_use]
    pub fn with_working_dir_locker(mut self, working_dir_locker: WorkingDirLocker) -> Self {
        self.working_dir_locker = working_dir_locker;
        self
    }

    /// Runs the context's command, recording commit statuses around it.
    pub async fn run(&self, context: &ProjectContext) -> ProjectResult {
        let span = context.span.clone();
        async move {
            self.update_status(context, CommitStatus::Pending).await;

            let outcome = match context.command_name {
                CommandName::Plan => self.plan(context).await,
                CommandName::PolicyCheck => self.policy_check(context).await,
                CommandName::Apply => self.apply(context).await,
                CommandName::Version => self.version(context).await,
                CommandName::Unlock => ProjectOutcome::Error(
                    "unlock does not run project workflows".to_owned(),
                ),
            };

            let result = ProjectResult {
                command: context.command_name,
                workspace: context.workspace.clone(),
                repo_rel_dir: context.repo_rel_dir.clone(),
                project_name: context.project_name.clone(),
                outcome,
            };

            info!(success = result.is_successful(), "project command finished");
            self.update_status(context, result.commit_status()).await;
            self.job_sender.send(context, "", true);
            result
        }
        .instrument(span)
        .await
    }

    async fn plan(&self, context: &ProjectContext) -> ProjectOutcome {
        let lock = match self.acquire_lock(context).await {
            Ok(lock) => lock,
            Err(outcome) => return outcome,
        };

        let outcome = self.plan_locked(context, &lock).await;
        if !outcome.is_success() {
            self.release_lock(&lock).await;
        }

        outcome
    }

    async fn plan_locked(
        &self,
        context: &ProjectContext,
        lock: &ProjectLockResponse,
    ) -> ProjectOutcome {
        let clone_dir = match self.clone_dir(context).await {
            Ok(clone_dir) => clone_dir,
            Err(error) => return ProjectOutcome::Error(error.to_string()),
        };
        let (project_dir, _guard) = match self.prepare(context, &clone_dir).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        match self
            .run_steps(context, context.workflow.steps(CommandName::Plan), &project_dir)
            .await
        {
            Ok(output) => ProjectOutcome::PlanSuccess(PlanSuccess {
                terraform_output: output,
                lock_url: self.lock_url_generator.generate(&lock.lock_key),
                re_plan_cmd: context.re_plan_cmd.clone(),
                apply_cmd: context.apply_cmd.clone(),
                has_diverged: self.working_dir.has_diverged(&clone_dir).await,
            }),
            Err(message) => ProjectOutcome::Error(message),
        }
    }

    /// Policy checks run under the lock their plan already holds, so it is never released here.
    async fn policy_check(&self, context: &ProjectContext) -> ProjectOutcome {
        let lock = match self.acquire_lock(context).await {
            Ok(lock) => lock,
            Err(outcome) => return outcome,
        };

        let clone_dir = match self.cloned_dir(context).await {
            Ok(clone_dir) => clone_dir,
            Err(outcome) => return outcome,
        };
        let (project_dir, _guard) = match self.prepare(context, &clone_dir).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        match self
            .run_steps(
                context,
                context.workflow.steps(CommandName::PolicyCheck),
                &project_dir,
            )
            .await
        {
            Ok(output) => ProjectOutcome::PolicyCheckSuccess(PolicyCheckSuccess {
                policy_check_output: output,
                lock_url: self.lock_url_generator.generate(&lock.lock_key),
                re_plan_cmd: context.re_plan_cmd.clone(),
                apply_cmd: context.apply_cmd.clone(),
                has_diverged: self.working_dir.has_diverged(&clone_dir).await,
            }),
            Err(message) => ProjectOutcome::Error(message),
        }
    }

    /// A successful apply keeps the lock until the pull request is unlocked.
    async fn apply(&self, context: &ProjectContext) -> ProjectOutcome {
        let lock = match self.acquire_lock(context).await {
            Ok(lock) => lock,
            Err(outcome) => return outcome,
        };

        let outcome = self.apply_locked(context).await;
        if !outcome.is_success() {
            self.release_lock(&lock).await;
        }

        outcome
    }

    async fn apply_locked(&self, context: &ProjectContext) -> ProjectOutcome {
        let clone_dir = match self.cloned_dir(context).await {
            Ok(clone_dir) => clone_dir,
            Err(outcome) => return outcome,
        };
        let (project_dir, _guard) = match self.prepare(context, &clone_dir).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        match self
            .run_steps(context, context.workflow.steps(CommandName::Apply), &project_dir)
            .await
        {
            Ok(output) => ProjectOutcome::ApplySuccess(output),
            Err(message) => ProjectOutcome::Error(message),
        }
    }

    async fn version(&self, context: &ProjectContext) -> ProjectOutcome {
        let clone_dir = match self.cloned_dir(context).await {
            Ok(clone_dir) => clone_dir,
            Err(outcome) => return outcome,
        };
        let (project_dir, _guard) = match self.prepare(context, &clone_dir).await {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        match self
            .run_steps(
                context,
                context.workflow.steps(CommandName::Version),
                &project_dir,
            )
            .await
        {
            Ok(output) => ProjectOutcome::VersionSuccess(output),
            Err(message) => ProjectOutcome::Error(message),
        }
    }

    /// Runs `steps` strictly in order, feeding env step values into later steps.
    ///
    /// On failure the error message is followed by the output gathered so far.
    async fn run_steps(
        &self,
        context: &ProjectContext,
        steps: &[WorkflowStep],
        path: &Path,
    ) -> Result<String, String> {
        let mut envs: HashMap<String, String> = HashMap::new();
        let mut outputs: Vec<String> = Vec::new();

        for step in steps {
            let result = match step {
                WorkflowStep::Init { extra_args } => {
                    self.steps.init.run(context, extra_args, path, &envs).await
                }
                WorkflowStep::Plan { extra_args } => {
                    self.steps.plan.run(context, extra_args, path, &envs).await
                }
                WorkflowStep::Show => self.steps.show.run(context, &[], path, &envs).await,
                WorkflowStep::PolicyCheck { extra_args } => {
                    self.steps
                        .policy_check
                        .run(context, extra_args, path, &envs)
                        .await
                }
                WorkflowStep::Apply { extra_args } => {
                    self.steps.apply.run(context, extra_args, path, &envs).await
                }
                WorkflowStep::Version => self.steps.version.run(context, &[], path, &envs).await,
                WorkflowStep::Run { command } => {
                    self.steps.run.run(context, command, path, &envs, true).await
                }
                WorkflowStep::Env {
                    name,
                    command,
                    value,
                } => match self
                    .steps
                    .env
                    .run(context, command.as_deref(), value.as_deref(), path, &envs)
                    .await
                {
                    Ok(value) => {
                        envs.insert(name.clone(), value);
                        continue;
                    }
                    Err(error) => Err(error),
                },
            };

            match result {
                Ok(output) if !output.is_empty() => outputs.push(output),
                Ok(_) => {}
                Err(error) => {
                    warn!(step = step.step_type(), error = %error, "workflow step failed");
                    return Err(format!("{error}\n{}", outputs.join("\n")));
                }
            }
        }

        Ok(outputs.join("\n"))
    }

    async fn acquire_lock(
        &self,
        context: &ProjectContext,
    ) -> Result<ProjectLockResponse, ProjectOutcome> {
        let lock = self
            .project_locker
            .try_lock(context)
            .await
            .map_err(|error| ProjectOutcome::Error(format!("acquiring lock: {error}")))?;

        if !lock.lock_acquired {
            return Err(ProjectOutcome::Failure(
                lock.lock_failure_reason.unwrap_or_default(),
            ));
        }

        Ok(lock)
    }

    async fn release_lock(&self, lock: &ProjectLockResponse) {
        if let Err(error) = self.project_locker.unlock(lock).await {
            warn!(lock_key = %lock.lock_key, error = %error, "failed to release project lock");
        }
    }

    async fn clone_dir(&self, context: &ProjectContext) -> AppResult<PathBuf> {
        self.working_dir
            .get_working_dir(&context.base_repo, &context.pull, &context.workspace)
            .await
    }

    /// Like [`Self::clone_dir`], but a missing checkout means plan never ran.
    async fn cloned_dir(&self, context: &ProjectContext) -> Result<PathBuf, ProjectOutcome> {
        match self.clone_dir(context).await {
            Ok(clone_dir) => Ok(clone_dir),
            Err(AppError::NotFound(_)) => Err(ProjectOutcome::Failure(
                "project has not been cloned–did you run plan?".to_owned(),
            )),
            Err(error) => Err(ProjectOutcome::Error(error.to_string())),
        }
    }

    /// Resolves the project directory and takes the working directory lock.
    async fn prepare(
        &self,
        context: &ProjectContext,
        clone_dir: &Path,
    ) -> Result<(PathBuf, WorkingDirLockGuard), ProjectOutcome> {
        let project_dir = clone_dir.join(&context.repo_rel_dir);
        if !tokio::fs::try_exists(&project_dir).await.unwrap_or(false) {
            return Err(ProjectOutcome::Error(format!(
                "dir \"{}\" does not exist",
                context.repo_rel_dir
            )));
        }

        let guard = self
            .working_dir_locker
            .try_lock(
                &context.base_repo.full_name,
                context.pull.num,
                &context.workspace,
                &context.repo_rel_dir,
            )
            .map_err(|error| match error {
                AppError::Conflict(message) => ProjectOutcome::Failure(message),
                other => ProjectOutcome::Error(other.to_string()),
            })?;

        Ok((project_dir, guard))
    }

    async fn update_status(&self, context: &ProjectContext, status: CommitStatus) {
        if let Err(error) = self
            .status_updater
            .update_project(context, context.command_name, status)
            .await
        {
            warn!(status = %status, error = %error, "failed to update project commit status");
        }
    }
}
