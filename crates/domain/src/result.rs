use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CommandName, CommitStatus};

static PLAN_SUMMARY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"Plan: \d+ to add, \d+ to change, \d+ to destroy\.|Plan: \d+ to import, \d+ to add, \d+ to change, \d+ to destroy\.|No changes\. (Infrastructure is up-to-date|Your infrastructure matches the configuration)\.",
    )
    .ok()
});

static OUTSIDE_CHANGES_NOTE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Note: Objects have changed outside of Terraform").ok());

// Moves the `+`/`-`/`~` marker of attribute lines to column zero.
static DIFF_KEYWORD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^( +)([-+~]\s)(.*)(\s=\s|\s->\s|<<|\{|\(known after apply\)| {2,}[^ ]+:.*)(.*)",
    )
    .ok()
});

// Same for list items, which have no `=`.
static DIFF_LIST_ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?m)^( +)([-+~]\s)(".*",)"#).ok());

static DIFF_TILDE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)^~").ok());

/// Successful plan of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSuccess {
    /// Raw plan output of the tool.
    pub terraform_output: String,
    /// URL that deletes the lock (and thereby the plan).
    pub lock_url: String,
    /// Comment that re-plans this project.
    pub re_plan_cmd: String,
    /// Comment that applies this project.
    pub apply_cmd: String,
    /// Whether the base branch moved ahead since the plan was computed.
    pub has_diverged: bool,
}

impl PlanSuccess {
    /// Extracts the one-line change summary from the plan output.
    ///
    /// Prefixed with a bold note when the tool reports drift outside of its control.
    #[must_use]
    pub fn summary(&self) -> String {
        let note = find(&OUTSIDE_CHANGES_NOTE, &self.terraform_output)
            .map(|note| format!("\n**{note}**\n"))
            .unwrap_or_default();
        let summary = find(&PLAN_SUMMARY, &self.terraform_output).unwrap_or_default();

        format!("{note}{summary}")
    }

    /// Rewrites the plan output so a `diff` code fence colours it.
    #[must_use]
    pub fn diff_markdown_formatted_output(&self) -> String {
        let output = replace_all(&DIFF_KEYWORD, &self.terraform_output, "${2}${1}${3}${4}${5}");
        let output = replace_all(&DIFF_LIST_ITEM, &output, "${2}${1}${3}");
        replace_all(&DIFF_TILDE, &output, "!")
    }
}

fn find<'a>(regex: &LazyLock<Option<Regex>>, haystack: &'a str) -> Option<&'a str> {
    regex
        .as_ref()
        .and_then(|regex| regex.find(haystack))
        .map(|found| found.as_str())
}

fn replace_all(regex: &LazyLock<Option<Regex>>, haystack: &str, replacement: &str) -> String {
    match regex.as_ref() {
        Some(regex) => regex.replace_all(haystack, replacement).into_owned(),
        None => haystack.to_owned(),
    }
}

/// Successful policy evaluation of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCheckSuccess {
    /// Raw output of the policy command.
    pub policy_check_output: String,
    /// URL that deletes the lock.
    pub lock_url: String,
    /// Comment that re-plans (and so re-checks) this project.
    pub re_plan_cmd: String,
    /// Comment that applies this project.
    pub apply_cmd: String,
    /// Whether the base branch moved ahead since the plan was computed.
    pub has_diverged: bool,
}

/// Outcome of one project command. Exactly one variant per result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProjectOutcome {
    /// Plan succeeded.
    PlanSuccess(PlanSuccess),
    /// Policy check succeeded.
    PolicyCheckSuccess(PolicyCheckSuccess),
    /// Apply succeeded with this output.
    ApplySuccess(String),
    /// Version command succeeded with this output.
    VersionSuccess(String),
    /// Command could not run, e.g. the project is locked by another pull request.
    Failure(String),
    /// A step failed with this message.
    Error(String),
}

impl ProjectOutcome {
    /// Returns whether the outcome is a success variant.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_) | Self::Error(_))
    }
}

/// Result of running one command for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResult {
    /// Command that produced the result.
    pub command: CommandName,
    /// Workspace the command ran in.
    pub workspace: String,
    /// Project directory relative to the repository root.
    pub repo_rel_dir: String,
    /// Optional configured project name.
    pub project_name: Option<String>,
    /// Outcome.
    pub outcome: ProjectOutcome,
}

impl ProjectResult {
    /// Returns whether the project finished without failure or error.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.outcome.is_success()
    }

    /// Returns the commit status matching the outcome.
    #[must_use]
    pub fn commit_status(&self) -> CommitStatus {
        if self.is_successful() {
            CommitStatus::Success
        } else {
            CommitStatus::Failed
        }
    }
}

/// Aggregated result of one command across its projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Per-project results in build order.
    pub project_results: Vec<ProjectResult>,
    /// Request-level error raised before any project ran.
    pub error: Option<String>,
    /// Request-level failure, e.g. a rejected repository.
    pub failure: Option<String>,
    /// Whether every plan was discarded because one project failed under automerge.
    pub plans_deleted: bool,
}

impl CommandResult {
    /// Creates a result that only carries a request-level error.
    #[must_use]
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Creates a result that only carries a request-level failure.
    #[must_use]
    pub fn from_failure(failure: impl Into<String>) -> Self {
        Self {
            failure: Some(failure.into()),
            ..Self::default()
        }
    }

    /// Returns whether anything failed at request or project level.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
            || self.failure.is_some()
            || self
                .project_results
                .iter()
                .any(|result| !result.is_successful())
    }

    /// Returns the commit status for the whole command.
    #[must_use]
    pub fn commit_status(&self) -> CommitStatus {
        if self.has_errors() {
            CommitStatus::Failed
        } else {
            CommitStatus::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandResult, PlanSuccess, ProjectOutcome, ProjectResult};
    use crate::{CommandName, CommitStatus};

    fn plan(output: &str) -> PlanSuccess {
        PlanSuccess {
            terraform_output: output.to_owned(),
            ..PlanSuccess::default()
        }
    }

    #[test]
    fn summary_finds_change_counts() {
        let output = format!("{}Plan: 1 to add, 0 to change, 0 to destroy.", "line\n".repeat(13));
        assert_eq!(plan(&output).summary(), "Plan: 1 to add, 0 to change, 0 to destroy.");
        assert_eq!(
            plan("No changes. Infrastructure is up-to-date.").summary(),
            "No changes. Infrastructure is up-to-date."
        );
        assert_eq!(plan("line\nline\n").summary(), "");
    }

    #[test]
    fn summary_prefixes_drift_note() {
        let output = "Note: Objects have changed outside of Terraform\n\nNo changes. Your infrastructure matches the configuration.";
        assert_eq!(
            plan(output).summary(),
            "\n**Note: Objects have changed outside of Terraform**\n\nNo changes. Your infrastructure matches the configuration."
        );
    }

    #[test]
    fn diff_format_moves_markers_to_column_zero() {
        let output = "~ resource \"aws_route53_record\" \"record\" {\n      ~ records = [\n            \"foo\",\n          - \"old\",\n        ]\n      + ttl     = 300\n    }";
        let formatted = plan(output).diff_markdown_formatted_output();

        assert_eq!(
            formatted,
            "! resource \"aws_route53_record\" \"record\" {\n!       records = [\n            \"foo\",\n-           \"old\",\n        ]\n+       ttl     = 300\n    }"
        );
    }

    #[test]
    fn command_status_fails_when_any_project_fails() {
        let result = CommandResult {
            project_results: vec![
                ProjectResult {
                    command: CommandName::Plan,
                    workspace: "default".to_owned(),
                    repo_rel_dir: ".".to_owned(),
                    project_name: None,
                    outcome: ProjectOutcome::PlanSuccess(plan("ok")),
                },
                ProjectResult {
                    command: CommandName::Plan,
                    workspace: "staging".to_owned(),
                    repo_rel_dir: ".".to_owned(),
                    project_name: None,
                    outcome: ProjectOutcome::Failure("locked".to_owned()),
                },
            ],
            ..CommandResult::default()
        };

        assert_eq!(result.project_results[0].commit_status(), CommitStatus::Success);
        assert_eq!(result.commit_status(), CommitStatus::Failed);
        assert_eq!(
            CommandResult::default().commit_status(),
            CommitStatus::Success
        );
        assert!(CommandResult::from_error("boom").has_errors());
    }
}
