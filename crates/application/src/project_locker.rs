use chrono::Utc;
use plangate_core::AppResult;
use plangate_domain::{LockKey, ProjectLock};
use tracing::info;

use crate::{Locker, ProjectContext};

/// Result of locking the project of one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLockResponse {
    /// Whether the command may proceed.
    pub lock_acquired: bool,
    /// User-facing explanation when the lock is held elsewhere.
    pub lock_failure_reason: Option<String>,
    /// Key of the project lock.
    pub lock_key: LockKey,
    /// Whether the lock lives in the store and must be released on failure.
    pub stored: bool,
}

/// Locks projects on behalf of the project command runner.
#[derive(Clone)]
pub struct ProjectLocker {
    locker: Locker,
}

impl ProjectLocker {
    /// Creates a project locker over the shared locker.
    #[must_use]
    pub fn new(locker: Locker) -> Self {
        Self { locker }
    }

    /// Attempts to lock the context's project workspace for its pull request.
    ///
    /// Contexts with repo locking disabled always acquire without touching the store.
    pub async fn try_lock(&self, context: &ProjectContext) -> AppResult<ProjectLockResponse> {
        let lock_key = context.lock_key();
        if !context.repo_locking {
            return Ok(ProjectLockResponse {
                lock_acquired: true,
                lock_failure_reason: None,
                lock_key,
                stored: false,
            });
        }

        let response = self
            .locker
            .try_lock(ProjectLock {
                project: context.project(),
                workspace: context.workspace.clone(),
                pull: context.pull.clone(),
                user: context.user.clone(),
                created_at: Utc::now(),
            })
            .await?;

        if response.lock_acquired {
            return Ok(ProjectLockResponse {
                lock_acquired: true,
                lock_failure_reason: None,
                lock_key,
                stored: true,
            });
        }

        let holder = &response.current_lock.pull;
        info!(
            lock_key = %lock_key,
            holder_pull = holder.num,
            "project is locked by another pull request"
        );

        Ok(ProjectLockResponse {
            lock_acquired: false,
            lock_failure_reason: Some(format!(
                "This project is currently locked by an unapplied plan from pull [#{num}]({url}). To continue, delete the lock from [#{num}]({url}) or apply that plan and merge the pull request.\n\nOnce the lock is released, comment `atlantis plan` here to re-roll the plan.",
                num = holder.num,
                url = holder.url,
            )),
            lock_key,
            stored: false,
        })
    }

    /// Releases a lock taken by [`Self::try_lock`]. No-op for unstored locks.
    pub async fn unlock(&self, response: &ProjectLockResponse) -> AppResult<()> {
        if response.stored {
            self.locker.unlock(&response.lock_key).await?;
        }

        Ok(())
    }
}
