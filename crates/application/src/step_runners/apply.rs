use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};
use plangate_domain::ToolVersion;
use tracing::warn;

use super::{StepRunner, effective_version, quote_arg};
use crate::{ProjectContext, TerraformExecutor};

/// Applies the saved plan file and removes it afterwards.
#[derive(Clone)]
pub struct ApplyStepRunner {
    executor: Arc<dyn TerraformExecutor>,
    default_version: ToolVersion,
}

impl ApplyStepRunner {
    /// Creates the apply step runner.
    #[must_use]
    pub fn new(executor: Arc<dyn TerraformExecutor>, default_version: ToolVersion) -> Self {
        Self {
            executor,
            default_version,
        }
    }
}

#[async_trait]
impl StepRunner for ApplyStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let plan_file = path.join(context.plan_file_name());
        if !tokio::fs::try_exists(&plan_file).await.unwrap_or(false) {
            return Err(AppError::Execution(format!(
                "no plan found at path \"{}\" and workspace \"{}\"–did you run plan?",
                context.repo_rel_dir, context.workspace
            )));
        }

        let mut args = vec!["apply".to_owned(), "-input=false".to_owned()];
        args.extend(extra_args.iter().cloned());
        args.extend(context.escaped_comment_args.iter().cloned());
        args.push(quote_arg(&plan_file));

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

        if let Err(error) = tokio::fs::remove_file(&plan_file).await {
            warn!(
                plan_file = %plan_file.display(),
                error = %error,
                "failed to remove applied plan file"
            );
        }

        Ok(output)
    }
}
