//! Plangate runner: executes one pull request command and prints its report.

#![forbid(unsafe_code)]

mod runner_config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use plangate_application::{
    CommandRequest, CommandRunner, DefaultProjectCommandBuilder, JobMessageSender, LockBackend,
    LockUrlGenerator, Locker, MarkdownRenderer, ProjectCommandRunner, StepRunners,
};
use plangate_core::{AppError, AppResult};
use plangate_domain::CommandName;
use plangate_infrastructure::{
    ChannelJobMessageSender, ConsoleVcsClient, InMemoryLockBackend, JobMessage, LocalWorkingDir,
    RedisLockBackend, ShellCustomStepRunner, TerraformBinaryExecutor,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::runner_config::{LockBackendConfig, RunnerConfig, init_tracing};

#[derive(Debug, Parser)]
#[command(
    name = "plangate-runner",
    version,
    about = "Runs one pull request command and prints its report"
)]
struct Cli {
    /// Command to run for every project in the request.
    command: CliCommand,
    /// JSON file holding the command request.
    request: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
enum CliCommand {
    Plan,
    PolicyCheck,
    Apply,
    Version,
    Unlock,
}

impl From<CliCommand> for CommandName {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Plan => Self::Plan,
            CliCommand::PolicyCheck => Self::PolicyCheck,
            CliCommand::Apply => Self::Apply,
            CliCommand::Version => Self::Version,
            CliCommand::Unlock => Self::Unlock,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let command = CommandName::from(cli.command);
    let config = RunnerConfig::load()?;
    let request = read_request(&cli.request).await?;

    let (job_sender, job_output) = ChannelJobMessageSender::new();
    let output_task = tokio::spawn(print_job_output(job_output));

    let runner = build_runner(&config, Arc::new(job_sender))?;
    let report = runner.run(command, &request).await;
    drop(runner);
    output_task
        .await
        .map_err(|error| AppError::Internal(format!("job output task failed: {error}")))?;

    let report = report?;
    info!(
        command = %command,
        status = %report.result.commit_status(),
        "command finished"
    );
    println!("{}", report.comment);

    Ok(())
}

async fn read_request(path: &Path) -> AppResult<CommandRequest> {
    let payload = tokio::fs::read_to_string(path).await.map_err(|error| {
        AppError::Validation(format!(
            "failed to read request file {}: {error}",
            path.display()
        ))
    })?;

    serde_json::from_str(&payload)
        .map_err(|error| AppError::Validation(format!("invalid command request: {error}")))
}

fn build_runner(
    config: &RunnerConfig,
    job_sender: Arc<dyn JobMessageSender>,
) -> AppResult<CommandRunner> {
    let lock_backend: Arc<dyn LockBackend> = match &config.lock_backend {
        LockBackendConfig::Memory => Arc::new(InMemoryLockBackend::new()),
        LockBackendConfig::Redis { url, key_prefix } => {
            let client = redis::Client::open(url.as_str())
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisLockBackend::new(client, key_prefix.as_str()))
        }
    };
    let locker = Locker::new(lock_backend);
    let working_dir = Arc::new(LocalWorkingDir::new(config.data_dir.as_path()));
    let vcs_client = Arc::new(ConsoleVcsClient);

    let executor = Arc::new(TerraformBinaryExecutor::new(
        config.tf_binary_dir.clone(),
        job_sender.clone(),
        config.command_timeout,
    ));
    let run_step_runner = Arc::new(ShellCustomStepRunner::new(
        job_sender.clone(),
        config.default_tf_version.clone(),
        config.command_timeout,
    ));
    let steps = StepRunners::new(
        executor,
        run_step_runner,
        config.default_tf_version.clone(),
        config.policy_check.clone(),
    )?;

    let project_runner = ProjectCommandRunner::new(
        steps,
        working_dir.clone(),
        locker.clone(),
        LockUrlGenerator::new(config.base_url.as_str())?,
        job_sender,
        vcs_client.clone(),
    );

    Ok(CommandRunner::new(
        Arc::new(DefaultProjectCommandBuilder::new(config.repo_locking)),
        project_runner,
        locker,
        working_dir,
        vcs_client.clone(),
        vcs_client,
    )
    .with_renderer(MarkdownRenderer::new(config.renderer))
    .with_allowlist(config.allowlist.clone())
    .with_settings(config.command_runner))
}

async fn print_job_output(mut receiver: UnboundedReceiver<JobMessage>) {
    while let Some(message) = receiver.recv().await {
        if !message.is_final {
            eprintln!("{}", message.line);
        }
    }
}
