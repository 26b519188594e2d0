//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod channel_job_message_sender;
mod console_vcs_client;
mod in_memory_lock_backend;
mod local_working_dir;
mod redis_lock_backend;
mod shell_custom_step_runner;
mod shell_process;
mod terraform_binary_executor;

#[cfg(test)]
mod test_support;

pub use channel_job_message_sender::{ChannelJobMessageSender, JobMessage};
pub use console_vcs_client::ConsoleVcsClient;
pub use in_memory_lock_backend::InMemoryLockBackend;
pub use local_working_dir::LocalWorkingDir;
pub use redis_lock_backend::RedisLockBackend;
pub use shell_custom_step_runner::ShellCustomStepRunner;
pub use terraform_binary_executor::TerraformBinaryExecutor;
