mod builder;
mod executor;
mod job_output;
mod vcs;
mod working_dir;

pub use builder::ProjectCommandBuilder;
pub use executor::{CustomStepRunner, TerraformExecutor};
pub use job_output::JobMessageSender;
pub use vcs::{CommitStatusUpdater, VcsClient};
pub use working_dir::WorkingDir;
