use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};

use super::EnvStepRunner;
use crate::{CustomStepRunner, ProjectContext};

/// Default `env` step: a literal value, or the trimmed output of a shell command.
#[derive(Clone)]
pub struct DefaultEnvStepRunner {
    run_step_runner: Arc<dyn CustomStepRunner>,
}

impl DefaultEnvStepRunner {
    /// Creates the env step runner over the `run` step runner.
    #[must_use]
    pub fn new(run_step_runner: Arc<dyn CustomStepRunner>) -> Self {
        Self { run_step_runner }
    }
}

#[async_trait]
impl EnvStepRunner for DefaultEnvStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        command: Option<&str>,
        value: Option<&str>,
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        if let Some(value) = value {
            return Ok(value.to_owned());
        }

        let Some(command) = command else {
            return Err(AppError::Validation(
                "env step requires a command or a value".to_owned(),
            ));
        };

        let output = self
            .run_step_runner
            .run(context, command, path, envs, false)
            .await?;

        Ok(output.trim().to_owned())
    }
}
