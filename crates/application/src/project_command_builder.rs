use std::collections::HashMap;

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};
use plangate_domain::{CommandName, Workflow};
use tracing::info_span;
use uuid::Uuid;

use crate::{CommandRequest, ProjectCommandBuilder, ProjectContext, ProjectSpec};

mod comment_command;

use comment_command::{build_comment, escape_args};

/// Builds one context per project listed in the request.
#[derive(Debug, Clone)]
pub struct DefaultProjectCommandBuilder {
    repo_locking: bool,
}

impl DefaultProjectCommandBuilder {
    /// Creates a builder. `repo_locking` is the default for projects that do not override it.
    #[must_use]
    pub fn new(repo_locking: bool) -> Self {
        Self { repo_locking }
    }

    fn build(
        &self,
        command: CommandName,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        let workflows = workflows(request)?;
        let escaped_comment_args = escape_args(&request.comment_args);
        let head_repo = request
            .head_repo
            .clone()
            .unwrap_or_else(|| request.base_repo.clone());

        request
            .projects
            .iter()
            .map(|spec| {
                let repo_rel_dir = clean_dir(&spec.dir)?;
                validate_workspace(&spec.workspace)?;
                let workflow = select_workflow(&workflows, spec)?;
                let project_name = spec.name.clone().filter(|name| !name.trim().is_empty());

                let span = info_span!(
                    "project",
                    repo = %request.base_repo.full_name,
                    pull = request.pull.num,
                    dir = %repo_rel_dir,
                    workspace = %spec.workspace,
                    command = %command,
                );

                Ok(ProjectContext {
                    command_name: command,
                    base_repo: request.base_repo.clone(),
                    head_repo: head_repo.clone(),
                    pull: request.pull.clone(),
                    user: request.user.clone(),
                    workspace: spec.workspace.clone(),
                    apply_cmd: build_comment(
                        CommandName::Apply,
                        &repo_rel_dir,
                        &spec.workspace,
                        project_name.as_deref(),
                        &[],
                    ),
                    re_plan_cmd: build_comment(
                        CommandName::Plan,
                        &repo_rel_dir,
                        &spec.workspace,
                        project_name.as_deref(),
                        &request.comment_args,
                    ),
                    repo_rel_dir,
                    project_name,
                    terraform_version: spec.terraform_version.clone(),
                    escaped_comment_args: escaped_comment_args.clone(),
                    workflow,
                    repo_locking: spec.repo_locking.unwrap_or(self.repo_locking),
                    verbose: request.verbose,
                    job_id: Uuid::new_v4(),
                    span,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProjectCommandBuilder for DefaultProjectCommandBuilder {
    async fn build_plan_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        self.build(CommandName::Plan, request)
    }

    async fn build_policy_check_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        self.build(CommandName::PolicyCheck, request)
    }

    async fn build_apply_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        self.build(CommandName::Apply, request)
    }

    async fn build_version_commands(
        &self,
        request: &CommandRequest,
    ) -> AppResult<Vec<ProjectContext>> {
        self.build(CommandName::Version, request)
    }
}

fn workflows(request: &CommandRequest) -> AppResult<HashMap<String, Workflow>> {
    let mut workflows = HashMap::new();
    for input in &request.workflows {
        let workflow = Workflow::new(input.clone())?;
        workflows.insert(workflow.name().to_owned(), workflow);
    }

    Ok(workflows)
}

fn select_workflow(
    workflows: &HashMap<String, Workflow>,
    spec: &ProjectSpec,
) -> AppResult<Workflow> {
    match spec.workflow.as_deref() {
        None => Ok(workflows
            .get(Workflow::DEFAULT_NAME)
            .cloned()
            .unwrap_or_else(Workflow::default_workflow)),
        Some(name) => workflows.get(name).cloned().ok_or_else(|| {
            AppError::Validation(format!(
                "workflow '{name}' referenced by dir '{}' is not defined",
                spec.dir
            ))
        }),
    }
}

/// Normalizes a project dir, rejecting paths that leave the repository.
fn clean_dir(dir: &str) -> AppResult<String> {
    if dir.starts_with('/') {
        return Err(AppError::Validation(format!(
            "project dir '{dir}' must be relative to the repository root"
        )));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(AppError::Validation(format!(
                    "project dir '{dir}' must stay inside the repository"
                )));
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return Ok(".".to_owned());
    }

    Ok(segments.join("/"))
}

/// Workspaces become path segments and tool arguments, so only
/// `[A-Za-z0-9._-]` is accepted and `..` is refused.
fn validate_workspace(workspace: &str) -> AppResult<()> {
    let allowed = workspace
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || matches!(character, '.' | '_' | '-'));

    if workspace.is_empty() || workspace == "." || workspace.contains("..") || !allowed {
        return Err(AppError::Validation(format!(
            "workspace '{workspace}' may only contain letters, digits, '.', '_' and '-' and must not contain '..'"
        )));
    }

    Ok(())
}
