use plangate_domain::{PullRequest, Repo, ToolVersion, User, WorkflowInput};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_WORKSPACE;

/// Pull request command as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Repository the pull request merges into.
    pub base_repo: Repo,
    /// Repository the pull request branch lives in. Defaults to the base repo.
    #[serde(default)]
    pub head_repo: Option<Repo>,
    /// Pull request metadata.
    pub pull: PullRequest,
    /// User who issued the command.
    pub user: User,
    /// Arguments after `--` in the comment.
    #[serde(default)]
    pub comment_args: Vec<String>,
    /// Projects the command targets.
    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
    /// Custom workflows selectable by projects.
    #[serde(default)]
    pub workflows: Vec<WorkflowInput>,
    /// Whether the report includes the log.
    #[serde(default)]
    pub verbose: bool,
}

/// One project targeted by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Directory relative to the repository root.
    pub dir: String,
    /// Tool workspace.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Optional project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pinned tool version.
    #[serde(default)]
    pub terraform_version: Option<ToolVersion>,
    /// Name of the workflow to run. Defaults to the built-in one.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Per-project override of repo locking.
    #[serde(default)]
    pub repo_locking: Option<bool>,
}

fn default_workspace() -> String {
    DEFAULT_WORKSPACE.to_owned()
}
