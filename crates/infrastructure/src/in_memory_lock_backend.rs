use std::collections::HashMap;

use async_trait::async_trait;
use plangate_application::LockBackend;
use plangate_core::AppResult;
use plangate_domain::{LockKey, ProjectLock};
use tokio::sync::RwLock;

/// Process-local lock store. Locks do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryLockBackend {
    locks: RwLock<HashMap<LockKey, ProjectLock>>,
}

impl InMemoryLockBackend {
    /// Creates an empty lock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockBackend for InMemoryLockBackend {
    async fn try_lock(&self, lock: ProjectLock) -> AppResult<(bool, ProjectLock)> {
        let key = lock.key();
        let mut locks = self.locks.write().await;

        if let Some(existing) = locks.get(&key) {
            return Ok((false, existing.clone()));
        }

        locks.insert(key, lock.clone());
        Ok((true, lock))
    }

    async fn unlock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        Ok(self.locks.write().await.remove(key))
    }

    async fn list(&self) -> AppResult<Vec<ProjectLock>> {
        Ok(self.locks.read().await.values().cloned().collect())
    }

    async fn get_lock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        Ok(self.locks.read().await.get(key).cloned())
    }

    async fn unlock_by_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> AppResult<Vec<ProjectLock>> {
        let mut locks = self.locks.write().await;
        let mut released = Vec::new();

        locks.retain(|_, lock| {
            if lock.is_owned_by(repo_full_name, pull_num) {
                released.push(lock.clone());
                false
            } else {
                true
            }
        });

        Ok(released)
    }
}
