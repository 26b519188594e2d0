use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;

use crate::ProjectContext;

mod apply;
mod env;
mod init;
mod minimum_version;
mod plan;
mod policy_check;
mod show;
mod version;

pub use apply::ApplyStepRunner;
pub use env::DefaultEnvStepRunner;
pub use init::InitStepRunner;
pub use minimum_version::MinimumVersionStepRunner;
pub use plan::PlanStepRunner;
pub use policy_check::{PolicyCheckSettings, PolicyCheckStepRunner};
pub use show::ShowStepRunner;
pub use version::VersionStepRunner;

/// Executes one built-in workflow step.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Runs the step in `path` and returns the output it contributes to the report.
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String>;
}

/// Computes the value of one `env` step.
#[async_trait]
pub trait EnvStepRunner: Send + Sync {
    /// Returns `value` when set, otherwise the trimmed output of `command`.
    async fn run(
        &self,
        context: &ProjectContext,
        command: Option<&str>,
        value: Option<&str>,
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String>;
}

/// Returns the version pinned by the context, falling back to `default_version`.
pub(crate) fn effective_version<'a>(
    context: &'a ProjectContext,
    default_version: &'a ToolVersion,
) -> &'a ToolVersion {
    context.terraform_version.as_ref().unwrap_or(default_version)
}

/// Quotes a path for the shell command line the executor builds.
pub(crate) fn quote_arg(value: &Path) -> String {
    let mut quoted = String::from("\"");
    for character in value.to_string_lossy().chars() {
        if matches!(character, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(character);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests;
