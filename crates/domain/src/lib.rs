//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod command;
mod lock;
mod repo;
mod result;
mod version;
mod workflow;

pub use command::{CommandName, CommitStatus};
pub use lock::{LockKey, Project, ProjectLock};
pub use repo::{PullRequest, PullRequestState, Repo, User, VcsHostType};
pub use result::{
    CommandResult, PlanSuccess, PolicyCheckSuccess, ProjectOutcome, ProjectResult,
};
pub use version::ToolVersion;
pub use workflow::{Workflow, WorkflowInput, WorkflowStep};
