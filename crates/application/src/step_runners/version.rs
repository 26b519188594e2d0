use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;

use super::{StepRunner, effective_version};
use crate::{ProjectContext, TerraformExecutor};

/// Runs the tool's `version` subcommand.
#[derive(Clone)]
pub struct VersionStepRunner {
    executor: Arc<dyn TerraformExecutor>,
    default_version: ToolVersion,
}

impl VersionStepRunner {
    /// Creates the version step runner.
    #[must_use]
    pub fn new(executor: Arc<dyn TerraformExecutor>, default_version: ToolVersion) -> Self {
        Self {
            executor,
            default_version,
        }
    }
}

#[async_trait]
impl StepRunner for VersionStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        _extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        self.executor
            .run_command_with_version(
                context,
                path,
                &["version".to_owned()],
                envs,
                effective_version(context, &self.default_version),
                context.workspace.as_str(),
            )
            .await
    }
}
