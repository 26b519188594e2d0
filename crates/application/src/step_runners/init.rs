use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;

use super::{StepRunner, effective_version};
use crate::{ProjectContext, TerraformExecutor};

/// Runs `init -input=false`.
///
/// Init output is streamed but kept out of the report.
#[derive(Clone)]
pub struct InitStepRunner {
    executor: Arc<dyn TerraformExecutor>,
    default_version: ToolVersion,
}

impl InitStepRunner {
    /// Creates the init step runner.
    #[must_use]
    pub fn new(executor: Arc<dyn TerraformExecutor>, default_version: ToolVersion) -> Self {
        Self {
            executor,
            default_version,
        }
    }
}

#[async_trait]
impl StepRunner for InitStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let mut args = vec![
            "init".to_owned(),
            "-input=false".to_owned(),
            "-no-color".to_owned(),
        ];
        args.extend(extra_args.iter().cloned());

        self.executor
            .run_command_with_version(
                context,
                path,
                &args,
                envs,
                effective_version(context, &self.default_version),
                context.workspace.as_str(),
            )
            .await?;

        Ok(String::new())
    }
}
