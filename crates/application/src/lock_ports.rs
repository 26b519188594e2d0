use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::{LockKey, ProjectLock};

/// Storage port behind the [`crate::Locker`].
///
/// Implementations must make `try_lock`, `unlock` and `unlock_by_pull`
/// linearizable per key: two concurrent `try_lock` calls on the same key
/// resolve to exactly one stored lock.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Stores `lock` when its key is free.
    ///
    /// Returns `(true, lock)` when stored, or `(false, existing)` when another
    /// lock already holds the key. The existing lock may belong to the same
    /// pull request.
    async fn try_lock(&self, lock: ProjectLock) -> AppResult<(bool, ProjectLock)>;

    /// Deletes the lock stored under `key` and returns it. Missing keys are not an error.
    async fn unlock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>>;

    /// Returns every stored lock.
    async fn list(&self) -> AppResult<Vec<ProjectLock>>;

    /// Returns the lock stored under `key`.
    async fn get_lock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>>;

    /// Deletes every lock owned by one pull request.
    ///
    /// A key another pull request has locked since is left in place.
    async fn unlock_by_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> AppResult<Vec<ProjectLock>>;
}
