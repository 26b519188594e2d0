use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use plangate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{PullRequest, User};

/// Directory that holds one deployable root module inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Full name of the repository, e.g. `owner/name`.
    pub repo_full_name: String,
    /// Path relative to the repository root. `.` for the root itself.
    pub path: String,
}

impl Project {
    /// Creates a project, normalising the relative path.
    #[must_use]
    pub fn new(repo_full_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            path: normalize_rel_path(&path.into()),
        }
    }
}

fn normalize_rel_path(path: &str) -> String {
    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>();

    if segments.is_empty() {
        ".".to_owned()
    } else {
        segments.join("/")
    }
}

/// Identity of a lock: `{repo_full_name}/{path}/{workspace}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    /// Derives the key for a project and workspace.
    #[must_use]
    pub fn new(project: &Project, workspace: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            project.repo_full_name, project.path, workspace
        ))
    }

    /// Wraps a key received from a caller, validating its shape.
    pub fn parse(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let slashes = value.matches('/').count();
        if slashes < 3 || value.ends_with('/') || value.starts_with('/') {
            return Err(AppError::Validation(format!(
                "lock key '{value}' must be of the form owner/repo/path/workspace"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for LockKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// A held lock on one project workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLock {
    /// Locked project.
    pub project: Project,
    /// Locked workspace.
    pub workspace: String,
    /// Pull request that owns the lock.
    pub pull: PullRequest,
    /// User whose command created the lock.
    pub user: User,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ProjectLock {
    /// Returns the key this lock is stored under.
    #[must_use]
    pub fn key(&self) -> LockKey {
        LockKey::new(&self.project, &self.workspace)
    }

    /// Returns whether the lock belongs to the given pull request.
    #[must_use]
    pub fn is_owned_by(&self, repo_full_name: &str, pull_num: u64) -> bool {
        self.pull.num == pull_num && self.pull.base_repo.full_name == repo_full_name
    }
}

#[cfg(test)]
mod tests {
    use super::{LockKey, Project};

    #[test]
    fn lock_key_joins_repo_path_and_workspace() {
        let project = Project::new("acme/infra", "./modules/network/");
        let key = LockKey::new(&project, "staging");

        assert_eq!(key.as_str(), "acme/infra/modules/network/staging");
    }

    #[test]
    fn project_root_path_normalizes_to_dot() {
        let project = Project::new("acme/infra", "");
        assert_eq!(project.path, ".");
        assert_eq!(LockKey::new(&project, "default").as_str(), "acme/infra/./default");
    }

    #[test]
    fn lock_key_parse_rejects_short_keys() {
        assert!(LockKey::parse("acme/infra/default").is_err());
        assert!(LockKey::parse("acme/infra/./default").is_ok());
    }
}
