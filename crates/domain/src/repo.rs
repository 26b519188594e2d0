use std::fmt::{Display, Formatter};

use plangate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Collaboration platform that hosts a repository and receives reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsHostType {
    /// GitHub and GitHub Enterprise.
    Github,
    /// GitLab (hosted or self-managed).
    Gitlab,
    /// Bitbucket Cloud.
    BitbucketCloud,
    /// Bitbucket Server / Data Center.
    BitbucketServer,
    /// Azure DevOps repos.
    AzureDevops,
}

impl VcsHostType {
    /// Returns stable identifier used in configuration and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::BitbucketCloud => "bitbucket_cloud",
            Self::BitbucketServer => "bitbucket_server",
            Self::AzureDevops => "azure_devops",
        }
    }

    /// Parses a stable identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "bitbucket_cloud" => Ok(Self::BitbucketCloud),
            "bitbucket_server" => Ok(Self::BitbucketServer),
            "azure_devops" => Ok(Self::AzureDevops),
            _ => Err(AppError::Validation(format!(
                "unknown vcs host type '{value}'"
            ))),
        }
    }
}

impl Display for VcsHostType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Repository identity as seen by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repo {
    /// `owner/name`, possibly with nested groups on GitLab.
    pub full_name: String,
    /// Owner (user, organisation or group path).
    pub owner: String,
    /// Repository name without owner.
    pub name: String,
    /// Hostname of the platform, e.g. `github.com`.
    pub hostname: String,
    /// Hosting platform.
    pub vcs_host: VcsHostType,
}

impl Repo {
    /// Builds a repo from its `owner/name` full name.
    pub fn new(
        full_name: impl Into<String>,
        hostname: impl Into<String>,
        vcs_host: VcsHostType,
    ) -> AppResult<Self> {
        let full_name = full_name.into();
        let Some((owner, name)) = full_name.rsplit_once('/') else {
            return Err(AppError::Validation(format!(
                "repo full name '{full_name}' must be of the form owner/name"
            )));
        };

        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "repo full name '{full_name}' must have a non-empty owner and name"
            )));
        }

        Ok(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
            full_name,
            hostname: hostname.into(),
            vcs_host,
        })
    }

    /// Returns the identifier matched against the repo allowlist.
    #[must_use]
    pub fn allowlist_id(&self) -> String {
        format!("{}/{}", self.hostname, self.full_name)
    }
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    /// Pull request is open.
    Open,
    /// Pull request was merged or closed.
    Closed,
}

/// Pull request metadata carried through every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number, unique within the base repo.
    pub num: u64,
    /// Commit SHA at the head of the pull request branch.
    pub head_commit: String,
    /// Web URL of the pull request.
    pub url: String,
    /// Source branch.
    pub head_branch: String,
    /// Merge-target branch.
    pub base_branch: String,
    /// Username of the pull request author.
    pub author: String,
    /// Current state.
    pub state: PullRequestState,
    /// Repository the pull request merges into.
    pub base_repo: Repo,
}

/// User who issued a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Username on the hosting platform.
    pub username: String,
}

impl User {
    /// Creates a user from a username.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}
