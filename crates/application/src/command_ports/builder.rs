use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::CommandName;

use crate::{CommandRequest, ProjectContext};

/// Turns a pull request command into one context per affected project.
#[async_trait]
pub trait ProjectCommandBuilder: Send + Sync {
    /// Builds contexts for `plan`.
    async fn build_plan_commands(&self, request: &CommandRequest)
    -> AppResult<Vec<ProjectContext>>;

    /// Builds contexts for `policy_check`.
    async fn build_policy_check_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>>;

    /// Builds contexts for `apply`.
    async fn build_apply_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>>;

    /// Builds contexts for `version`.
    async fn build_version_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>>;

    /// Dispatches to the builder method of `command`. Unlock has no project contexts.
    async fn build_commands(
        &self,
        command: CommandName,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        match command {
            CommandName::Plan => self.build_plan_commands(request).await,
            CommandName::PolicyCheck => self.build_policy_check_commands(request).await,
            CommandName::Apply => self.build_apply_commands(request).await,
            CommandName::Version => self.build_version_commands(request).await,
            CommandName::Unlock => Ok(Vec::new()),
        }
    }
}
