use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;
use regex::Regex;
use tracing::debug;

use super::{StepRunner, effective_version, quote_arg};
use crate::{ProjectContext, TerraformExecutor};

static PLUS_DIFF: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^ {2}\+").ok());
static TILDE_DIFF: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^ {2}~").ok());
static MINUS_DIFF: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^ {2}-").ok());

/// Lines that start the meaningful part of plan output. Everything above is refresh noise.
const PLAN_START_MARKERS: [&str; 3] = [
    "An execution plan has been generated",
    "Terraform used the selected providers",
    "No changes.",
];

/// Runs `plan` in the context's workspace and writes the plan file.
#[derive(Clone)]
pub struct PlanStepRunner {
    executor: Arc<dyn TerraformExecutor>,
    default_version: ToolVersion,
}

impl PlanStepRunner {
    /// Creates the plan step runner.
    #[must_use]
    pub fn new(executor: Arc<dyn TerraformExecutor>, default_version: ToolVersion) -> Self {
        Self {
            executor,
            default_version,
        }
    }

    async fn switch_workspace(
        &self,
        context: &ProjectContext,
        path: &Path,
        envs: &HashMap<String, String>,
        version: &ToolVersion,
    ) -> AppResult<()> {
        let workspace = context.workspace.as_str();
        let current = self
            .executor
            .run_command_with_version(
                context,
                path,
                &["workspace".to_owned(), "show".to_owned()],
                envs,
                version,
                workspace,
            )
            .await?;

        if current.trim() == workspace {
            return Ok(());
        }

        debug!(from = current.trim(), to = workspace, "switching tool workspace");
        let select = self
            .executor
            .run_command_with_version(
                context,
                path,
                &[
                    "workspace".to_owned(),
                    "select".to_owned(),
                    workspace.to_owned(),
                ],
                envs,
                version,
                workspace,
            )
            .await;

        if select.is_err() {
            self.executor
                .run_command_with_version(
                    context,
                    path,
                    &[
                        "workspace".to_owned(),
                        "new".to_owned(),
                        workspace.to_owned(),
                    ],
                    envs,
                    version,
                    workspace,
                )
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl StepRunner for PlanStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let version = effective_version(context, &self.default_version);
        self.switch_workspace(context, path, envs, version).await?;

        let plan_file = path.join(context.plan_file_name());
        let mut args = vec![
            "plan".to_owned(),
            "-input=false".to_owned(),
            "-refresh".to_owned(),
            "-no-color".to_owned(),
            "-out".to_owned(),
            quote_arg(&plan_file),
        ];
        args.extend(extra_args.iter().cloned());
        args.extend(context.escaped_comment_args.iter().cloned());

        let output = self
            .executor
            .run_command_with_version(
                context,
                path,
                &args,
                envs,
                version,
                context.workspace.as_str(),
            )
            .await?;

        Ok(format_plan_output(&output))
    }
}

/// Drops refresh noise and pulls diff markers to the start of their line.
pub(crate) fn format_plan_output(output: &str) -> String {
    let stripped = strip_refreshing(output);
    let mut formatted = stripped.to_owned();
    for (pattern, marker) in [(&PLUS_DIFF, "+"), (&TILDE_DIFF, "~"), (&MINUS_DIFF, "-")] {
        if let Some(regex) = pattern.as_ref() {
            formatted = regex.replace_all(&formatted, marker).into_owned();
        }
    }

    formatted
}

fn strip_refreshing(output: &str) -> &str {
    let mut offset = 0;
    for line in output.split_inclusive('\n') {
        if PLAN_START_MARKERS
            .iter()
            .any(|marker| line.contains(marker))
        {
            return &output[offset..];
        }
        offset += line.len();
    }

    output
}
