use std::collections::BTreeMap;
use std::sync::Arc;

use plangate_core::AppResult;
use plangate_domain::{LockKey, ProjectLock};
use tracing::{debug, info};

use crate::lock_ports::LockBackend;

/// Outcome of a lock attempt that reached the store.
///
/// Store failures are reported through `Err` instead, so a response is
/// always fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryLockResponse {
    /// Whether the caller now holds the lock.
    pub lock_acquired: bool,
    /// Key the lock is stored under.
    pub lock_key: LockKey,
    /// The held lock: the caller's on success, the conflicting one otherwise.
    pub current_lock: ProjectLock,
}

/// Mutual-exclusion authority for project workspaces.
///
/// Store errors from the backend propagate unchanged; adapters report them
/// as [`plangate_core::AppError::Unavailable`].
#[derive(Clone)]
pub struct Locker {
    backend: Arc<dyn LockBackend>,
}

impl Locker {
    /// Creates a locker over one lock store.
    #[must_use]
    pub fn new(backend: Arc<dyn LockBackend>) -> Self {
        Self { backend }
    }

    /// Attempts to lock the lock's project workspace for its pull request.
    ///
    /// Re-locking a key already held by the same pull request succeeds and
    /// returns the existing lock unchanged.
    pub async fn try_lock(&self, lock: ProjectLock) -> AppResult<TryLockResponse> {
        let lock_key = lock.key();
        let requesting_pull = lock.pull.num;
        let requesting_repo = lock.pull.base_repo.full_name.clone();

        let (stored, current_lock) = self.backend.try_lock(lock).await?;

        let lock_acquired =
            stored || current_lock.is_owned_by(requesting_repo.as_str(), requesting_pull);

        debug!(
            lock_key = %lock_key,
            lock_acquired,
            holder_pull = current_lock.pull.num,
            "lock attempt resolved"
        );

        Ok(TryLockResponse {
            lock_acquired,
            lock_key,
            current_lock,
        })
    }

    /// Releases one lock. Unlocking a free key returns `None`.
    pub async fn unlock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        let released = self.backend.unlock(key).await?;

        if released.is_some() {
            info!(lock_key = %key, "lock released");
        }

        Ok(released)
    }

    /// Releases every lock held by one pull request.
    pub async fn unlock_by_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> AppResult<Vec<ProjectLock>> {
        let released = self
            .backend
            .unlock_by_pull(repo_full_name, pull_num)
            .await?;

        info!(
            repo = repo_full_name,
            pull = pull_num,
            released = released.len(),
            "pull request locks released"
        );

        Ok(released)
    }

    /// Returns a snapshot of every held lock keyed by lock key.
    pub async fn list(&self) -> AppResult<BTreeMap<LockKey, ProjectLock>> {
        let locks = self.backend.list().await?;

        Ok(locks.into_iter().map(|lock| (lock.key(), lock)).collect())
    }

    /// Returns the lock stored under `key`.
    pub async fn get_lock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        self.backend.get_lock(key).await
    }
}
