use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use plangate_core::{AppError, AppResult};

/// In-process guard that keeps two commands of one pull request out of the
/// same project workspace directory.
#[derive(Debug, Clone, Default)]
pub struct WorkingDirLocker {
    held: Arc<Mutex<HashSet<String>>>,
}

/// Releases the working directory lock on drop.
#[derive(Debug)]
pub struct WorkingDirLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl WorkingDirLocker {
    /// Creates an empty locker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks `{repo}/{pull}/{workspace}/{path}`, failing with [`AppError::Conflict`] when held.
    pub fn try_lock(
        &self,
        repo_full_name: &str,
        pull_num: u64,
        workspace: &str,
        path: &str,
    ) -> AppResult<WorkingDirLockGuard> {
        let key = format!("{repo_full_name}/{pull_num}/{workspace}/{path}");
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        if !held.insert(key.clone()) {
            return Err(AppError::Conflict(format!(
                "the {workspace} workspace at path {path} is currently locked by another command that is running for this pull request.\nWait until the previous command is complete and try again"
            )));
        }

        Ok(WorkingDirLockGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }
}

impl Drop for WorkingDirLockGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use plangate_core::AppError;

    use super::WorkingDirLocker;

    #[test]
    fn second_lock_on_same_workspace_conflicts_until_guard_drops() {
        let locker = WorkingDirLocker::new();

        let guard = locker.try_lock("acme/infra", 3, "default", "network");
        assert!(guard.is_ok());

        let second = locker.try_lock("acme/infra", 3, "default", "network");
        match second {
            Err(AppError::Conflict(message)) => assert_eq!(
                message,
                "the default workspace at path network is currently locked by another command that is running for this pull request.\nWait until the previous command is complete and try again"
            ),
            _ => unreachable!(),
        }

        drop(guard);
        assert!(locker.try_lock("acme/infra", 3, "default", "network").is_ok());
    }

    #[test]
    fn other_workspaces_paths_and_pulls_are_independent() {
        let locker = WorkingDirLocker::new();
        let _staging = locker.try_lock("acme/infra", 3, "staging", ".");

        assert!(locker.try_lock("acme/infra", 3, "production", ".").is_ok());
        assert!(locker.try_lock("acme/infra", 3, "staging", "network").is_ok());
        assert!(locker.try_lock("acme/infra", 4, "staging", ".").is_ok());
    }
}
