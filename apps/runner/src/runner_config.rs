use std::env;
use std::path::PathBuf;
use std::time::Duration;

use plangate_application::step_runners::PolicyCheckSettings;
use plangate_application::{CommandRunnerSettings, RendererSettings, RepoAllowlist};
use plangate_core::{AppError, AppResult};
use plangate_domain::ToolVersion;
use tracing_subscriber::EnvFilter;

/// Where project locks are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockBackendConfig {
    /// Process-local map. Locks end with the process.
    Memory,
    /// Shared Redis server.
    Redis {
        /// Connection URL.
        url: String,
        /// Prefix of every key written by the backend.
        key_prefix: String,
    },
}

/// Runtime configuration of the runner binary.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub lock_backend: LockBackendConfig,
    pub default_tf_version: ToolVersion,
    pub tf_binary_dir: Option<PathBuf>,
    pub command_timeout: Duration,
    pub policy_check: PolicyCheckSettings,
    pub allowlist: RepoAllowlist,
    pub repo_locking: bool,
    pub command_runner: CommandRunnerSettings,
    pub renderer: RendererSettings,
}

impl RunnerConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let vars = EnvVars { lookup: &lookup };

        let base_url = vars
            .string("PLANGATE_URL")
            .unwrap_or_else(|| "http://localhost:4141".to_owned());
        let data_dir = PathBuf::from(
            vars.string("DATA_DIR")
                .unwrap_or_else(|| ".plangate".to_owned()),
        );

        let lock_backend = match vars
            .string("LOCK_BACKEND")
            .unwrap_or_else(|| "memory".to_owned())
            .as_str()
        {
            "memory" => LockBackendConfig::Memory,
            "redis" => LockBackendConfig::Redis {
                url: vars.required("REDIS_URL")?,
                key_prefix: vars
                    .string("REDIS_KEY_PREFIX")
                    .unwrap_or_else(|| "plangate".to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "LOCK_BACKEND must be either 'memory' or 'redis', got '{other}'"
                )));
            }
        };

        let default_tf_version = ToolVersion::parse(
            vars.string("DEFAULT_TF_VERSION")
                .as_deref()
                .unwrap_or("1.5.7"),
        )
        .map_err(|error| AppError::Validation(format!("invalid DEFAULT_TF_VERSION: {error}")))?;

        let timeout_seconds = vars.u64("TF_COMMAND_TIMEOUT_SECONDS", 3600)?;
        if timeout_seconds == 0 {
            return Err(AppError::Validation(
                "TF_COMMAND_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let parallel_pool_size = vars.usize("PARALLEL_POOL_SIZE", 15)?;
        if parallel_pool_size == 0 {
            return Err(AppError::Validation(
                "PARALLEL_POOL_SIZE must be greater than zero".to_owned(),
            ));
        }

        let allowlist = RepoAllowlist::parse(
            vars.string("REPO_ALLOWLIST").as_deref().unwrap_or("*"),
        )?;
        let disable_repo_locking = vars.bool("DISABLE_REPO_LOCKING")?;

        Ok(Self {
            base_url,
            data_dir,
            lock_backend,
            default_tf_version,
            tf_binary_dir: vars.string("TF_BINARY_DIR").map(PathBuf::from),
            command_timeout: Duration::from_secs(timeout_seconds),
            policy_check: PolicyCheckSettings {
                command: vars.string("POLICY_CHECK_COMMAND"),
                policy_paths: vars
                    .string("POLICY_PATHS")
                    .map(|paths| {
                        paths
                            .split(',')
                            .map(str::trim)
                            .filter(|path| !path.is_empty())
                            .map(PathBuf::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            allowlist,
            repo_locking: !disable_repo_locking,
            command_runner: CommandRunnerSettings {
                parallel_plan: vars.bool("PARALLEL_PLAN")?,
                parallel_apply: vars.bool("PARALLEL_APPLY")?,
                parallel_pool_size,
                automerge: vars.bool("AUTOMERGE")?,
            },
            renderer: RendererSettings {
                disable_apply: vars.bool("DISABLE_APPLY")?,
                disable_apply_all: vars.bool("DISABLE_APPLY_ALL")?,
                disable_markdown_folding: vars.bool("DISABLE_MARKDOWN_FOLDING")?,
                disable_repo_locking,
                enable_diff_markdown_format: vars.bool("ENABLE_DIFF_MARKDOWN_FORMAT")?,
                gitlab_supports_common_mark: vars.bool("GITLAB_SUPPORTS_COMMON_MARK")?,
            },
        })
    }
}

struct EnvVars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvVars<'_> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<String> {
        self.string(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn bool(&self, name: &str) -> AppResult<bool> {
        match self.string(name) {
            None => Ok(false),
            Some(value) if value.eq_ignore_ascii_case("true") || value == "1" => Ok(true),
            Some(value) if value.eq_ignore_ascii_case("false") || value == "0" => Ok(false),
            Some(value) => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': expected true or false"
            ))),
        }
    }

    fn u64(&self, name: &str, default: u64) -> AppResult<u64> {
        match self.string(name) {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn usize(&self, name: &str, default: usize) -> AppResult<usize> {
        match self.string(name) {
            Some(value) => value.parse::<usize>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
