use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};

use super::{StepRunner, quote_arg};
use crate::{CustomStepRunner, ProjectContext};

/// Policy engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyCheckSettings {
    /// Policy engine command, e.g. `conftest test`.
    pub command: Option<String>,
    /// Policy directories passed with `--policy`.
    pub policy_paths: Vec<PathBuf>,
}

/// Evaluates the show file against the configured policy sets.
#[derive(Clone)]
pub struct PolicyCheckStepRunner {
    run_step_runner: Arc<dyn CustomStepRunner>,
    settings: PolicyCheckSettings,
}

impl PolicyCheckStepRunner {
    /// Creates the policy check step runner.
    #[must_use]
    pub fn new(run_step_runner: Arc<dyn CustomStepRunner>, settings: PolicyCheckSettings) -> Self {
        Self {
            run_step_runner,
            settings,
        }
    }

    fn command_line(&self, command: &str, extra_args: &[String], show_file: &Path) -> String {
        let mut parts = vec![command.to_owned()];
        for policy_path in &self.settings.policy_paths {
            parts.push("--policy".to_owned());
            parts.push(quote_arg(policy_path));
        }
        parts.extend(extra_args.iter().cloned());
        parts.push(quote_arg(show_file));
        parts.join(" ")
    }
}

#[async_trait]
impl StepRunner for PolicyCheckStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let Some(command) = self.settings.command.as_deref() else {
            return Err(AppError::Validation(
                "policy checks are enabled but no policy command is configured".to_owned(),
            ));
        };

        let show_file = path.join(context.show_file_name());
        let command_line = self.command_line(command, extra_args, &show_file);
        let output = self
            .run_step_runner
            .run(context, &command_line, path, envs, true)
            .await?;

        Ok(output.trim_end().to_owned())
    }
}
