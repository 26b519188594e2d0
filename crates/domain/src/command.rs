use std::fmt::{Display, Formatter};

use plangate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Command a pull request comment can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    /// Compute an execution plan.
    Plan,
    /// Apply previously computed plans.
    Apply,
    /// Evaluate policies against computed plans.
    PolicyCheck,
    /// Report the tool version used by each project.
    Version,
    /// Release every lock held by the pull request.
    Unlock,
}

impl CommandName {
    /// Returns stable identifier used in comments and statuses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::PolicyCheck => "policy_check",
            Self::Version => "version",
            Self::Unlock => "unlock",
        }
    }

    /// Returns the human title used in report headings.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Plan => "Plan",
            Self::Apply => "Apply",
            Self::PolicyCheck => "Policy Check",
            Self::Version => "Version",
            Self::Unlock => "Unlock",
        }
    }

    /// Parses a stable identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            "policy_check" => Ok(Self::PolicyCheck),
            "version" => Ok(Self::Version),
            "unlock" => Ok(Self::Unlock),
            _ => Err(AppError::Validation(format!("unknown command '{value}'"))),
        }
    }

    /// Returns whether the command mutates infrastructure state and needs the project lock.
    #[must_use]
    pub fn requires_lock(&self) -> bool {
        matches!(self, Self::Plan | Self::Apply | Self::PolicyCheck)
    }
}

impl Display for CommandName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Commit status reported to the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    /// Command is running.
    Pending,
    /// Command finished without failures.
    Success,
    /// Command finished with at least one failure or error.
    Failed,
}

impl CommitStatus {
    /// Returns stable status value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl Display for CommitStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::CommandName;

    #[test]
    fn policy_check_title_is_spaced() {
        assert_eq!(CommandName::PolicyCheck.title(), "Policy Check");
        assert_eq!(
            CommandName::parse("policy_check").ok(),
            Some(CommandName::PolicyCheck)
        );
    }

    #[test]
    fn only_mutating_commands_require_lock() {
        assert!(CommandName::Plan.requires_lock());
        assert!(CommandName::Apply.requires_lock());
        assert!(!CommandName::Version.requires_lock());
        assert!(!CommandName::Unlock.requires_lock());
    }
}
