use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use plangate_core::{AppError, AppResult};
use plangate_domain::{
    CommandName, CommitStatus, LockKey, Project, ProjectLock, PullRequest, PullRequestState,
    Repo, ToolVersion, User, VcsHostType, Workflow,
};
use tokio::sync::Mutex;
use tracing::Span;
use uuid::Uuid;

use crate::{
    CommandRequest, CommitStatusUpdater, CustomStepRunner, JobMessageSender, LockBackend,
    ProjectContext, ProjectSpec, TerraformExecutor, VcsClient, WorkingDir,
};

pub(crate) fn repo() -> Repo {
    Repo::new("acme/infra", "github.com", VcsHostType::Github)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn pull(num: u64) -> PullRequest {
    PullRequest {
        num,
        head_commit: "5e1c2a9".to_owned(),
        url: format!("https://github.com/acme/infra/pull/{num}"),
        head_branch: format!("feature-{num}"),
        base_branch: "main".to_owned(),
        author: "octocat".to_owned(),
        state: PullRequestState::Open,
        base_repo: repo(),
    }
}

pub(crate) fn project_lock(pull_num: u64, path: &str, workspace: &str) -> ProjectLock {
    ProjectLock {
        project: Project::new("acme/infra", path),
        workspace: workspace.to_owned(),
        pull: pull(pull_num),
        user: User::new("octocat"),
        created_at: Utc::now(),
    }
}

pub(crate) fn project_context(command_name: CommandName) -> ProjectContext {
    ProjectContext {
        command_name,
        base_repo: repo(),
        head_repo: repo(),
        pull: pull(1),
        user: User::new("octocat"),
        workspace: "default".to_owned(),
        repo_rel_dir: ".".to_owned(),
        project_name: None,
        terraform_version: None,
        escaped_comment_args: Vec::new(),
        workflow: Workflow::default_workflow(),
        repo_locking: true,
        apply_cmd: "atlantis apply -d . -w default".to_owned(),
        re_plan_cmd: "atlantis plan -d . -w default".to_owned(),
        verbose: false,
        job_id: Uuid::new_v4(),
        span: Span::none(),
    }
}

/// Lock store fake with an optional outage switch.
#[derive(Default)]
pub(crate) struct FakeLockBackend {
    pub(crate) locks: Mutex<HashMap<LockKey, ProjectLock>>,
    pub(crate) unavailable: AtomicBool,
}

impl FakeLockBackend {
    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("lock store is down".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl LockBackend for FakeLockBackend {
    async fn try_lock(&self, lock: ProjectLock) -> AppResult<(bool, ProjectLock)> {
        self.check_available()?;
        let mut locks = self.locks.lock().await;
        if let Some(existing) = locks.get(&lock.key()) {
            return Ok((false, existing.clone()));
        }

        locks.insert(lock.key(), lock.clone());
        Ok((true, lock))
    }

    async fn unlock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        self.check_available()?;
        Ok(self.locks.lock().await.remove(key))
    }

    async fn list(&self) -> AppResult<Vec<ProjectLock>> {
        self.check_available()?;
        Ok(self.locks.lock().await.values().cloned().collect())
    }

    async fn get_lock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        self.check_available()?;
        Ok(self.locks.lock().await.get(key).cloned())
    }

    async fn unlock_by_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> AppResult<Vec<ProjectLock>> {
        self.check_available()?;
        let mut locks = self.locks.lock().await;
        let keys = locks
            .iter()
            .filter(|(_, lock)| lock.is_owned_by(repo_full_name, pull_num))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        Ok(keys.iter().filter_map(|key| locks.remove(key)).collect())
    }
}

/// One recorded executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutorCall {
    pub(crate) path: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) envs: HashMap<String, String>,
    pub(crate) version: String,
    pub(crate) workspace: String,
}

/// Tool executor fake answering by the leading arguments of each call.
///
/// Unscripted calls succeed with empty output.
#[derive(Default)]
pub(crate) struct FakeTerraformExecutor {
    pub(crate) calls: Mutex<Vec<ExecutorCall>>,
    responses: Mutex<Vec<(String, AppResult<String>)>>,
}

impl FakeTerraformExecutor {
    pub(crate) async fn respond(&self, args_prefix: &str, response: AppResult<String>) {
        self.responses
            .lock()
            .await
            .push((args_prefix.to_owned(), response));
    }

    pub(crate) async fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|call| call.args.join(" "))
            .collect()
    }
}

#[async_trait]
impl TerraformExecutor for FakeTerraformExecutor {
    async fn run_command_with_version(
        &self,
        _context: &ProjectContext,
        path: &Path,
        args: &[String],
        envs: &HashMap<String, String>,
        version: &ToolVersion,
        workspace: &str,
    ) -> AppResult<String> {
        self.calls.lock().await.push(ExecutorCall {
            path: path.to_path_buf(),
            args: args.to_vec(),
            envs: envs.clone(),
            version: version.to_string(),
            workspace: workspace.to_owned(),
        });

        let command = args.join(" ");
        self.responses
            .lock()
            .await
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map_or_else(|| Ok(String::new()), |(_, response)| response.clone())
    }
}

/// One recorded custom command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CustomCall {
    pub(crate) command: String,
    pub(crate) envs: HashMap<String, String>,
    pub(crate) stream_output: bool,
}

/// Shell runner fake answering by exact command text.
#[derive(Default)]
pub(crate) struct FakeCustomStepRunner {
    pub(crate) calls: Mutex<Vec<CustomCall>>,
    responses: Mutex<HashMap<String, AppResult<String>>>,
}

impl FakeCustomStepRunner {
    pub(crate) async fn respond(&self, command: &str, response: AppResult<String>) {
        self.responses
            .lock()
            .await
            .insert(command.to_owned(), response);
    }
}

#[async_trait]
impl CustomStepRunner for FakeCustomStepRunner {
    async fn run(
        &self,
        _context: &ProjectContext,
        command: &str,
        _path: &Path,
        envs: &HashMap<String, String>,
        stream_output: bool,
    ) -> AppResult<String> {
        self.calls.lock().await.push(CustomCall {
            command: command.to_owned(),
            envs: envs.clone(),
            stream_output,
        });

        self.responses
            .lock()
            .await
            .get(command)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

pub(crate) fn version(value: &str) -> ToolVersion {
    ToolVersion::parse(value).unwrap_or_else(|_| unreachable!())
}

/// Working directory fake rooted in a temporary directory.
pub(crate) struct FakeWorkingDir {
    pub(crate) root: PathBuf,
    pub(crate) cloned: AtomicBool,
    pub(crate) diverged: AtomicBool,
    pub(crate) deleted: Mutex<Vec<String>>,
}

impl FakeWorkingDir {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cloned: AtomicBool::new(true),
            diverged: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkingDir for FakeWorkingDir {
    async fn get_working_dir(
        &self,
        _repo: &Repo,
        pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<PathBuf> {
        if !self.cloned.load(Ordering::SeqCst) {
            return Err(AppError::NotFound(format!(
                "working dir for pull {} workspace {workspace}",
                pull.num
            )));
        }

        Ok(self.root.clone())
    }

    async fn has_diverged(&self, _clone_dir: &Path) -> bool {
        self.diverged.load(Ordering::SeqCst)
    }

    async fn delete_for_workspace(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
        workspace: &str,
    ) -> AppResult<()> {
        self.deleted.lock().await.push(workspace.to_owned());
        Ok(())
    }
}

/// Job output fake keeping every line it was sent.
#[derive(Default)]
pub(crate) struct RecordingJobSender {
    pub(crate) messages: std::sync::Mutex<Vec<(String, bool)>>,
}

impl RecordingJobSender {
    pub(crate) fn messages(&self) -> Vec<(String, bool)> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl JobMessageSender for RecordingJobSender {
    fn send(&self, _context: &ProjectContext, line: &str, is_final: bool) {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((line.to_owned(), is_final));
    }
}

/// Commit status fake keeping every update in order.
#[derive(Default)]
pub(crate) struct RecordingStatusUpdater {
    pub(crate) combined: Mutex<Vec<(CommandName, CommitStatus)>>,
    pub(crate) projects: Mutex<Vec<(String, CommandName, CommitStatus)>>,
}

#[async_trait]
impl CommitStatusUpdater for RecordingStatusUpdater {
    async fn update_combined(
        &self,
        _repo: &Repo,
        _pull: &PullRequest,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()> {
        self.combined.lock().await.push((command, status));
        Ok(())
    }

    async fn update_project(
        &self,
        context: &ProjectContext,
        command: CommandName,
        status: CommitStatus,
    ) -> AppResult<()> {
        self.projects
            .lock()
            .await
            .push((context.repo_rel_dir.clone(), command, status));
        Ok(())
    }
}

/// VCS fake keeping every posted comment.
#[derive(Default)]
pub(crate) struct RecordingVcsClient {
    pub(crate) comments: Mutex<Vec<(u64, String, CommandName)>>,
}

#[async_trait]
impl VcsClient for RecordingVcsClient {
    async fn create_comment(
        &self,
        _repo: &Repo,
        pull_num: u64,
        comment: &str,
        command: CommandName,
    ) -> AppResult<()> {
        self.comments
            .lock()
            .await
            .push((pull_num, comment.to_owned(), command));
        Ok(())
    }
}

pub(crate) fn project_spec(dir: &str, workspace: &str) -> ProjectSpec {
    ProjectSpec {
        dir: dir.to_owned(),
        workspace: workspace.to_owned(),
        name: None,
        terraform_version: None,
        workflow: None,
        repo_locking: None,
    }
}

pub(crate) fn command_request(projects: Vec<ProjectSpec>) -> CommandRequest {
    CommandRequest {
        base_repo: repo(),
        head_repo: None,
        pull: pull(1),
        user: User::new("octocat"),
        comment_args: Vec::new(),
        projects,
        workflows: Vec::new(),
        verbose: false,
    }
}
