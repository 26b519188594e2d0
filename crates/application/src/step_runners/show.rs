use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};
use plangate_domain::ToolVersion;

use super::{StepRunner, effective_version, quote_arg};
use crate::{ProjectContext, TerraformExecutor};

/// Renders the plan file as JSON into the show file for policy checks.
#[derive(Clone)]
pub struct ShowStepRunner {
    executor: Arc<dyn TerraformExecutor>,
    default_version: ToolVersion,
}

impl ShowStepRunner {
    /// Creates the show step runner.
    #[must_use]
    pub fn new(executor: Arc<dyn TerraformExecutor>, default_version: ToolVersion) -> Self {
        Self {
            executor,
            default_version,
        }
    }
}

#[async_trait]
impl StepRunner for ShowStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        _extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let plan_file = path.join(context.plan_file_name());
        let show_file = path.join(context.show_file_name());
        let args = vec![
            "show".to_owned(),
            "-no-color".to_owned(),
            "-json".to_owned(),
            quote_arg(&plan_file),
        ];

        let output = self
            .executor
            .run_command_with_version(
                context,
                path,
                &args,
                envs,
                effective_version(context, &self.default_version),
                context.workspace.as_str(),
            )
            .await?;

        tokio::fs::write(&show_file, output).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to write show file '{}': {error}",
                show_file.display()
            ))
        })?;

        Ok(String::new())
    }
}
