use plangate_domain::{
    CommandName, LockKey, Project, PullRequest, Repo, ToolVersion, User, Workflow,
};
use tracing::Span;
use uuid::Uuid;

/// Workspace name used when a project does not select one.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Everything needed to run one command for one project.
///
/// Built once per project per command and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Command being run.
    pub command_name: CommandName,
    /// Repository the pull request merges into.
    pub base_repo: Repo,
    /// Repository the pull request branch lives in.
    pub head_repo: Repo,
    /// Pull request metadata.
    pub pull: PullRequest,
    /// User who issued the command.
    pub user: User,
    /// Tool workspace.
    pub workspace: String,
    /// Project directory relative to the repository root.
    pub repo_rel_dir: String,
    /// Optional configured project name.
    pub project_name: Option<String>,
    /// Tool version pinned for the project. `None` means the configured default.
    pub terraform_version: Option<ToolVersion>,
    /// Extra comment arguments, escaped for shell use.
    pub escaped_comment_args: Vec<String>,
    /// Workflow whose steps run for the command.
    pub workflow: Workflow,
    /// Whether commands take the project lock.
    pub repo_locking: bool,
    /// Comment that applies this project.
    pub apply_cmd: String,
    /// Comment that re-plans this project.
    pub re_plan_cmd: String,
    /// Whether the report includes the log.
    pub verbose: bool,
    /// Identifier of the output stream for this run.
    pub job_id: Uuid,
    /// Span every log line of this run is recorded under.
    pub span: Span,
}

impl ProjectContext {
    /// Returns the project this context runs in.
    #[must_use]
    pub fn project(&self) -> Project {
        Project::new(self.base_repo.full_name.as_str(), self.repo_rel_dir.as_str())
    }

    /// Returns the key of the project lock.
    #[must_use]
    pub fn lock_key(&self) -> LockKey {
        LockKey::new(&self.project(), self.workspace.as_str())
    }

    /// Returns the plan file name, e.g. `staging.tfplan` or `network-staging.tfplan`.
    #[must_use]
    pub fn plan_file_name(&self) -> String {
        self.file_name("tfplan")
    }

    /// Returns the JSON plan file name written by the show step.
    #[must_use]
    pub fn show_file_name(&self) -> String {
        self.file_name("json")
    }

    fn file_name(&self, extension: &str) -> String {
        match self.project_name.as_deref() {
            Some(name) if !name.is_empty() => format!(
                "{}-{}.{extension}",
                name.replace('/', "::"),
                self.workspace
            ),
            _ => format!("{}.{extension}", self.workspace),
        }
    }
}
