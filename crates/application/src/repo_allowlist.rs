use plangate_core::{AppError, AppResult};
use plangate_domain::Repo;

/// Message posted when a command arrives for a repository outside the allowlist.
pub const NOT_ALLOWLISTED_MESSAGE: &str = "This repo is not allowlisted for Atlantis.";

/// Repositories commands may run for, as `hostname/owner/repo` rules.
///
/// Rules are comma separated and case insensitive. A trailing `*` matches any
/// identifier with the preceding prefix, so `github.com/acme/*` admits every
/// repository of `acme` and `*` admits everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAllowlist {
    rules: Vec<String>,
}

impl RepoAllowlist {
    /// Parses a comma separated rule list.
    pub fn parse(rules: &str) -> AppResult<Self> {
        let rules = rules
            .split(',')
            .map(|rule| rule.trim().to_lowercase())
            .filter(|rule| !rule.is_empty())
            .collect::<Vec<_>>();

        if let Some(rule) = rules
            .iter()
            .find(|rule| rule.contains("://"))
        {
            return Err(AppError::Validation(format!(
                "allowlist rule '{rule}' must not contain a scheme"
            )));
        }

        Ok(Self { rules })
    }

    /// Allows every repository.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            rules: vec!["*".to_owned()],
        }
    }

    /// Returns whether `repo_id` (`hostname/owner/repo`) matches a rule.
    #[must_use]
    pub fn is_allowed(&self, repo_id: &str) -> bool {
        let candidate = repo_id.to_lowercase();
        self.rules.iter().any(|rule| match rule.strip_suffix('*') {
            Some(prefix) => candidate.starts_with(prefix),
            None => candidate == *rule,
        })
    }

    /// Fails with [`AppError::Forbidden`] when `repo` is not allowed.
    pub fn check(&self, repo: &Repo) -> AppResult<()> {
        if self.is_allowed(repo.allowlist_id().as_str()) {
            return Ok(());
        }

        Err(AppError::Forbidden(NOT_ALLOWLISTED_MESSAGE.to_owned()))
    }
}
