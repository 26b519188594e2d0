use plangate_domain::{
    CommandName, CommandResult, PlanSuccess, PolicyCheckSuccess, ProjectOutcome, ProjectResult,
    VcsHostType,
};
use serde::{Deserialize, Serialize};

mod templates;
mod view;

use view::{NextSteps, ProjectBody, ProjectHeading, ReportBody, ReportView, SingleLayout};

/// Feature switches that change the report layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Hide per-project apply hints.
    pub disable_apply: bool,
    /// Hide the apply-all footer and the rules between projects.
    pub disable_apply_all: bool,
    /// Never fold long output.
    pub disable_markdown_folding: bool,
    /// Hide the per-project lock deletion link.
    pub disable_repo_locking: bool,
    /// Rewrite plan output so `diff` fences colour changed attributes.
    pub enable_diff_markdown_format: bool,
    /// Whether the GitLab instance renders `<details>` blocks.
    pub gitlab_supports_common_mark: bool,
}

/// Decides when long output is collapsed into a "Show Output" disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingPolicy {
    /// Output with more line breaks than this is folded.
    pub max_unfolded_lines: usize,
    /// Whether the GitLab instance renders `<details>` blocks.
    pub gitlab_supports_common_mark: bool,
    /// Turns folding off everywhere.
    pub disabled: bool,
}

impl FoldingPolicy {
    /// Line breaks allowed before output gets folded.
    pub const DEFAULT_MAX_UNFOLDED_LINES: usize = 12;

    /// Builds the policy matching renderer settings.
    #[must_use]
    pub fn from_settings(settings: &RendererSettings) -> Self {
        Self {
            max_unfolded_lines: Self::DEFAULT_MAX_UNFOLDED_LINES,
            gitlab_supports_common_mark: settings.gitlab_supports_common_mark,
            disabled: settings.disable_markdown_folding,
        }
    }

    /// Returns whether `host` renders `<details>` disclosures.
    #[must_use]
    pub fn supports_folding(&self, host: VcsHostType) -> bool {
        match host {
            VcsHostType::Github | VcsHostType::AzureDevops => true,
            VcsHostType::Gitlab => self.gitlab_supports_common_mark,
            VcsHostType::BitbucketCloud | VcsHostType::BitbucketServer => false,
        }
    }

    /// Returns whether `output` is folded on `host`.
    #[must_use]
    pub fn should_fold(&self, host: VcsHostType, output: &str) -> bool {
        !self.disabled
            && self.supports_folding(host)
            && output.matches('\n').count() > self.max_unfolded_lines
    }
}

/// Turns a [`CommandResult`] into the Markdown comment posted on the pull request.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    settings: RendererSettings,
    folding: FoldingPolicy,
}

impl MarkdownRenderer {
    /// Creates a renderer with the default folding threshold.
    #[must_use]
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            settings,
            folding: FoldingPolicy::from_settings(&settings),
        }
    }

    /// Overrides the folding threshold and host matrix.
    #[must_use]
    pub fn with_folding_policy(mut self, folding: FoldingPolicy) -> Self {
        self.folding = folding;
        self
    }

    /// Renders the report for `command`. `log` is appended when `verbose`.
    #[must_use]
    pub fn render(
        &self,
        result: &CommandResult,
        command: CommandName,
        log: &str,
        verbose: bool,
        host: VcsHostType,
    ) -> String {
        let view = ReportView {
            body: self.report_body(result, command, host),
            log: verbose.then(|| log.to_owned()),
        };

        templates::render_report(&view)
    }

    fn disable_apply_all(&self) -> bool {
        self.settings.disable_apply_all || self.settings.disable_apply
    }

    fn report_body(
        &self,
        result: &CommandResult,
        command: CommandName,
        host: VcsHostType,
    ) -> ReportBody {
        let title = command.title();
        if let Some(error) = &result.error {
            return ReportBody::CommandError {
                title,
                error: error.clone(),
                approve_policies: command == CommandName::PolicyCheck,
            };
        }
        if let Some(failure) = &result.failure {
            return ReportBody::CommandFailure {
                title,
                failure: failure.clone(),
            };
        }

        let footer_allowed = !self.disable_apply_all() && !result.plans_deleted;
        let plan_like = matches!(command, CommandName::Plan | CommandName::PolicyCheck);

        if let [single] = result.project_results.as_slice() {
            let layout = match command {
                CommandName::Plan | CommandName::PolicyCheck if single.is_successful() => {
                    SingleLayout::Plan {
                        apply_all_footer: footer_allowed,
                    }
                }
                CommandName::Plan | CommandName::PolicyCheck | CommandName::Version
                    if !single.is_successful() =>
                {
                    SingleLayout::Unsuccessful
                }
                _ => SingleLayout::Output,
            };

            return ReportBody::SingleProject {
                title,
                heading: heading(single),
                body: self.project_body(single, result.plans_deleted, host),
                layout,
            };
        }

        let rule_after_each = !plan_like || !self.disable_apply_all();
        ReportBody::MultiProject {
            title,
            projects: result
                .project_results
                .iter()
                .map(|project| {
                    (
                        heading(project),
                        self.project_body(project, result.plans_deleted, host),
                    )
                })
                .collect(),
            rule_after_each,
            apply_all_footer: plan_like && footer_allowed && !result.project_results.is_empty(),
        }
    }

    fn project_body(
        &self,
        project: &ProjectResult,
        plans_deleted: bool,
        host: VcsHostType,
    ) -> ProjectBody {
        let title = project.command.title();
        match &project.outcome {
            ProjectOutcome::PlanSuccess(success) => self.plan_body(success, plans_deleted, host),
            ProjectOutcome::PolicyCheckSuccess(success) => {
                self.policy_check_body(success, plans_deleted, host)
            }
            ProjectOutcome::ApplySuccess(output) => ProjectBody::Output {
                output: output.clone(),
                diff: true,
                folded: self.folding.should_fold(host, output),
            },
            ProjectOutcome::VersionSuccess(output) => ProjectBody::Output {
                output: output.clone(),
                diff: false,
                folded: self.folding.should_fold(host, output),
            },
            ProjectOutcome::Failure(failure) => ProjectBody::Failure {
                title,
                failure: failure.clone(),
            },
            ProjectOutcome::Error(error) => ProjectBody::Error {
                title,
                error: error.clone(),
                folded: self.folding.should_fold(host, error),
                approve_policies: project.command == CommandName::PolicyCheck,
            },
        }
    }

    fn plan_body(
        &self,
        success: &PlanSuccess,
        plans_deleted: bool,
        host: VcsHostType,
    ) -> ProjectBody {
        let output = if self.settings.enable_diff_markdown_format {
            success.diff_markdown_formatted_output()
        } else {
            success.terraform_output.clone()
        };

        ProjectBody::Plan {
            folded: self.folding.should_fold(host, &success.terraform_output),
            summary: success.summary(),
            output,
            next_steps: self.next_steps(
                plans_deleted,
                &success.apply_cmd,
                &success.lock_url,
                &success.re_plan_cmd,
                false,
            ),
            diverged: success.has_diverged,
        }
    }

    fn policy_check_body(
        &self,
        success: &PolicyCheckSuccess,
        plans_deleted: bool,
        host: VcsHostType,
    ) -> ProjectBody {
        ProjectBody::Plan {
            output: success.policy_check_output.clone(),
            next_steps: self.next_steps(
                plans_deleted,
                &success.apply_cmd,
                &success.lock_url,
                &success.re_plan_cmd,
                true,
            ),
            folded: self
                .folding
                .should_fold(host, &success.policy_check_output),
            summary: String::new(),
            diverged: success.has_diverged,
        }
    }

    fn next_steps(
        &self,
        plans_deleted: bool,
        apply_cmd: &str,
        lock_url: &str,
        re_plan_cmd: &str,
        re_run_policies: bool,
    ) -> NextSteps {
        if plans_deleted {
            return NextSteps::PlanDiscarded;
        }

        NextSteps::Hints {
            apply_cmd: (!self.settings.disable_apply).then(|| apply_cmd.to_owned()),
            lock_url: (!self.settings.disable_repo_locking).then(|| lock_url.to_owned()),
            re_plan_cmd: re_plan_cmd.to_owned(),
            re_run_policies,
        }
    }
}

fn heading(project: &ProjectResult) -> ProjectHeading {
    ProjectHeading {
        project_name: project
            .project_name
            .as_ref()
            .filter(|name| !name.is_empty())
            .cloned(),
        dir: project.repo_rel_dir.clone(),
        workspace: project.workspace.clone(),
    }
}
