//! Application services and ports.

#![forbid(unsafe_code)]

mod command_ports;
mod command_request;
mod command_runner;
mod lock_ports;
mod lock_service;
mod lock_url_generator;
mod markdown_renderer;
mod project_command_builder;
mod project_command_runner;
mod project_context;
mod project_locker;
mod repo_allowlist;
mod result_aggregator;
/// Workflow step runners and the minimum-version gate.
pub mod step_runners;
mod working_dir_locker;

#[cfg(test)]
mod test_support;

pub use command_ports::{
    CommitStatusUpdater, CustomStepRunner, JobMessageSender, ProjectCommandBuilder,
    TerraformExecutor, VcsClient, WorkingDir,
};
pub use command_request::{CommandRequest, ProjectSpec};
pub use command_runner::{
    CommandReport, CommandRunner, CommandRunnerSettings, UNLOCK_FAILED_MESSAGE, UNLOCKED_MESSAGE,
};
pub use lock_ports::LockBackend;
pub use lock_service::{Locker, TryLockResponse};
pub use lock_url_generator::LockUrlGenerator;
pub use markdown_renderer::{FoldingPolicy, MarkdownRenderer, RendererSettings};
pub use project_command_builder::DefaultProjectCommandBuilder;
pub use project_command_runner::{ProjectCommandRunner, StepRunners};
pub use project_context::{DEFAULT_WORKSPACE, ProjectContext};
pub use project_locker::{ProjectLockResponse, ProjectLocker};
pub use repo_allowlist::{NOT_ALLOWLISTED_MESSAGE, RepoAllowlist};
pub use result_aggregator::{INCOMPLETE_PROJECT_ERROR, ResultAggregator};
pub use working_dir_locker::{WorkingDirLockGuard, WorkingDirLocker};
