//! Redis-backed project lock store.
//!
//! Each lock is a hash `{prefix}:lock:{key}` holding the JSON lock and the
//! name of its pull request index set `{prefix}:pull:{repo}:{num}`. The set
//! `{prefix}:locks` lists every held key. The prefix is a hash tag, so all
//! keys share one cluster slot. Mutations run as Lua scripts that receive
//! every key they touch through `KEYS`; index members are read first and the
//! script re-checks ownership before deleting.

use async_trait::async_trait;
use plangate_application::LockBackend;
use plangate_core::{AppError, AppResult};
use plangate_domain::{LockKey, ProjectLock};
use redis::{AsyncCommands, Script};

const UNLOCK_ATTEMPTS: usize = 3;

const TRY_LOCK_SCRIPT: &str = r#"
local existing = redis.call('HGET', KEYS[1], 'lock')
if existing then
  return {0, existing}
end
redis.call('HSET', KEYS[1], 'lock', ARGV[1], 'pull', KEYS[2])
redis.call('SADD', KEYS[2], ARGV[2])
redis.call('SADD', KEYS[3], ARGV[2])
return {1, ARGV[1]}
"#;

// KEYS: lock hash, all-locks set, pull index read from the hash.
const UNLOCK_SCRIPT: &str = r#"
local existing = redis.call('HGET', KEYS[1], 'lock')
if not existing then
  return {}
end
if redis.call('HGET', KEYS[1], 'pull') ~= KEYS[3] then
  return {'retry'}
end
redis.call('DEL', KEYS[1])
redis.call('SREM', KEYS[3], ARGV[1])
redis.call('SREM', KEYS[2], ARGV[1])
return {'released', existing}
"#;

// KEYS: pull index, all-locks set, then one lock hash per ARGV member.
const UNLOCK_BY_PULL_SCRIPT: &str = r#"
local released = {}
for index = 3, #KEYS do
  local member = ARGV[index - 2]
  local existing = redis.call('HGET', KEYS[index], 'lock')
  if existing and redis.call('HGET', KEYS[index], 'pull') == KEYS[1] then
    table.insert(released, existing)
    redis.call('DEL', KEYS[index])
    redis.call('SREM', KEYS[2], member)
  end
  redis.call('SREM', KEYS[1], member)
end
return released
"#;

// KEYS: one lock hash per held key.
const LIST_SCRIPT: &str = r#"
local locks = {}
for index = 1, #KEYS do
  local existing = redis.call('HGET', KEYS[index], 'lock')
  if existing then
    table.insert(locks, existing)
  end
end
return locks
"#;

/// Redis implementation of the lock backend port.
#[derive(Clone)]
pub struct RedisLockBackend {
    client: redis::Client,
    key_prefix: String,
}

impl RedisLockBackend {
    /// Creates a backend with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn lock_key_for(&self, key: &str) -> String {
        format!("{{{}}}:lock:{key}", self.key_prefix)
    }

    fn pull_index_for(&self, repo_full_name: &str, pull_num: u64) -> String {
        format!("{{{}}}:pull:{repo_full_name}:{pull_num}", self.key_prefix)
    }

    fn all_locks_key(&self) -> String {
        format!("{{{}}}:locks", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl LockBackend for RedisLockBackend {
    async fn try_lock(&self, lock: ProjectLock) -> AppResult<(bool, ProjectLock)> {
        let key = lock.key();
        let payload = encode_lock(&lock)?;
        let mut connection = self.connection().await?;

        let (stored, current): (i32, String) = Script::new(TRY_LOCK_SCRIPT)
            .key(self.lock_key_for(key.as_str()))
            .key(self.pull_index_for(&lock.pull.base_repo.full_name, lock.pull.num))
            .key(self.all_locks_key())
            .arg(payload)
            .arg(key.as_str())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to acquire lock {key}: {error}"))
            })?;

        Ok((stored == 1, decode_lock(&current)?))
    }

    async fn unlock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        let mut connection = self.connection().await?;
        let lock_key = self.lock_key_for(key.as_str());

        for _ in 0..UNLOCK_ATTEMPTS {
            let pull_index: Option<String> =
                connection.hget(&lock_key, "pull").await.map_err(|error| {
                    AppError::Unavailable(format!("failed to read lock {key}: {error}"))
                })?;
            let Some(pull_index) = pull_index else {
                return Ok(None);
            };

            let reply: Vec<String> = Script::new(UNLOCK_SCRIPT)
                .key(&lock_key)
                .key(self.all_locks_key())
                .key(pull_index)
                .arg(key.as_str())
                .invoke_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to release lock {key}: {error}"))
                })?;

            match reply.as_slice() {
                [] => return Ok(None),
                [status, payload] if status == "released" => return decode_lock(payload).map(Some),
                _ => {}
            }
        }

        Err(AppError::Unavailable(format!(
            "failed to release lock {key}: lock changed owner during release"
        )))
    }

    async fn list(&self) -> AppResult<Vec<ProjectLock>> {
        let mut connection = self.connection().await?;

        let members: Vec<String> = connection
            .smembers(self.all_locks_key())
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to list locks: {error}")))?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let script = Script::new(LIST_SCRIPT);
        let mut invocation = script.prepare_invoke();
        for member in &members {
            invocation.key(self.lock_key_for(member));
        }
        let payloads: Vec<String> = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to list locks: {error}")))?;

        payloads.iter().map(|payload| decode_lock(payload)).collect()
    }

    async fn get_lock(&self, key: &LockKey) -> AppResult<Option<ProjectLock>> {
        let mut connection = self.connection().await?;

        let payload: Option<String> = connection
            .hget(self.lock_key_for(key.as_str()), "lock")
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to read lock {key}: {error}")))?;

        payload.as_deref().map(decode_lock).transpose()
    }

    async fn unlock_by_pull(
        &self,
        repo_full_name: &str,
        pull_num: u64,
    ) -> AppResult<Vec<ProjectLock>> {
        let mut connection = self.connection().await?;
        let pull_index = self.pull_index_for(repo_full_name, pull_num);
        let unavailable = |error: redis::RedisError| {
            AppError::Unavailable(format!(
                "failed to release locks of {repo_full_name} pull {pull_num}: {error}"
            ))
        };

        let members: Vec<String> = connection
            .smembers(&pull_index)
            .await
            .map_err(unavailable)?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let script = Script::new(UNLOCK_BY_PULL_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(&pull_index).key(self.all_locks_key());
        for member in &members {
            invocation.key(self.lock_key_for(member));
        }
        for member in &members {
            invocation.arg(member);
        }
        let payloads: Vec<String> = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(unavailable)?;

        payloads.iter().map(|payload| decode_lock(payload)).collect()
    }
}

fn encode_lock(lock: &ProjectLock) -> AppResult<String> {
    serde_json::to_string(lock)
        .map_err(|error| AppError::Internal(format!("failed to encode lock: {error}")))
}

fn decode_lock(payload: &str) -> AppResult<ProjectLock> {
    serde_json::from_str(payload)
        .map_err(|error| AppError::Internal(format!("failed to decode stored lock: {error}")))
}
