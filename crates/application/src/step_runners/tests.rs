use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use plangate_core::{AppError, AppResult};
use plangate_domain::CommandName;

use crate::ProjectContext;
use crate::test_support::{
    FakeCustomStepRunner, FakeTerraformExecutor, project_context, version,
};

use super::plan::format_plan_output;
use super::{
    ApplyStepRunner, DefaultEnvStepRunner, EnvStepRunner, InitStepRunner,
    MinimumVersionStepRunner, PlanStepRunner, PolicyCheckSettings, PolicyCheckStepRunner,
    ShowStepRunner, StepRunner, VersionStepRunner, quote_arg,
};

#[derive(Default)]
struct CountingStepRunner {
    invocations: AtomicUsize,
}

#[async_trait]
impl StepRunner for CountingStepRunner {
    async fn run(
        &self,
        _context: &ProjectContext,
        _extra_args: &[String],
        _path: &Path,
        _envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok("delegated".to_owned())
    }
}

fn work_dir() -> PathBuf {
    PathBuf::from("/work/acme/infra/1/default")
}

#[tokio::test]
async fn minimum_version_gate_skips_old_versions() {
    let delegate = Arc::new(CountingStepRunner::default());
    let gate =
        MinimumVersionStepRunner::new(delegate.clone(), version("0.12.0"), version("1.5.7"));
    let mut context = project_context(CommandName::PolicyCheck);
    context.terraform_version = Some(version("0.11.15"));

    let output = gate
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        output,
        "Version: 0.11.15 is unsupported for this step. Minimum version is: 0.12.0"
    );
    assert_eq!(delegate.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn minimum_version_gate_runs_delegate_at_minimum() {
    let delegate = Arc::new(CountingStepRunner::default());
    let gate =
        MinimumVersionStepRunner::new(delegate.clone(), version("0.12.0"), version("0.11.0"));
    let mut context = project_context(CommandName::PolicyCheck);
    context.terraform_version = Some(version("0.12.0"));

    let output = gate.run(&context, &[], &work_dir(), &HashMap::new()).await;

    assert_eq!(output, Ok("delegated".to_owned()));
    assert_eq!(delegate.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn minimum_version_gate_falls_back_to_default_version() {
    let delegate = Arc::new(CountingStepRunner::default());
    let gate =
        MinimumVersionStepRunner::new(delegate.clone(), version("0.12.0"), version("0.11.14"));
    let context = project_context(CommandName::PolicyCheck);

    let output = gate
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(output.starts_with("Version: 0.11.14 is unsupported"));
    assert_eq!(delegate.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn env_step_prefers_literal_value() {
    let runner = Arc::new(FakeCustomStepRunner::default());
    let env_runner = DefaultEnvStepRunner::new(runner.clone());
    let context = project_context(CommandName::Plan);

    let value = env_runner
        .run(
            &context,
            Some("echo 321"),
            Some("test"),
            &work_dir(),
            &HashMap::new(),
        )
        .await;

    assert_eq!(value, Ok("test".to_owned()));
    assert!(runner.calls.lock().await.is_empty());
}

#[tokio::test]
async fn env_step_trims_command_output_without_streaming() {
    let runner = Arc::new(FakeCustomStepRunner::default());
    runner.respond("echo 123", Ok("123\n".to_owned())).await;
    let env_runner = DefaultEnvStepRunner::new(runner.clone());
    let context = project_context(CommandName::Plan);

    let value = env_runner
        .run(&context, Some("echo 123"), None, &work_dir(), &HashMap::new())
        .await;

    assert_eq!(value, Ok("123".to_owned()));
    let calls = runner.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].stream_output);
}

#[tokio::test]
async fn env_step_without_command_or_value_is_invalid() {
    let env_runner = DefaultEnvStepRunner::new(Arc::new(FakeCustomStepRunner::default()));
    let context = project_context(CommandName::Plan);

    let value = env_runner
        .run(&context, None, None, &work_dir(), &HashMap::new())
        .await;

    assert!(matches!(value, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn version_step_uses_context_version_and_workspace() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("version", Ok("Terraform v0.15.0".to_owned()))
        .await;
    let runner = VersionStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Version);
    context.terraform_version = Some(version("0.15.0"));
    context.workspace = "staging".to_owned();

    let output = runner
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await;

    assert_eq!(output, Ok("Terraform v0.15.0".to_owned()));
    let calls = executor.calls.lock().await;
    assert_eq!(calls[0].args, vec!["version".to_owned()]);
    assert_eq!(calls[0].version, "0.15.0");
    assert_eq!(calls[0].workspace, "staging");
}

#[tokio::test]
async fn init_step_reports_no_output() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("init", Ok("Terraform has been successfully initialized!".to_owned()))
        .await;
    let runner = InitStepRunner::new(executor.clone(), version("1.5.7"));
    let context = project_context(CommandName::Plan);

    let output = runner
        .run(
            &context,
            &["-upgrade".to_owned()],
            &work_dir(),
            &HashMap::new(),
        )
        .await;

    assert_eq!(output, Ok(String::new()));
    assert_eq!(
        executor.commands().await,
        vec!["init -input=false -no-color -upgrade".to_owned()]
    );
}

#[tokio::test]
async fn init_step_error_carries_output() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond(
            "init",
            Err(AppError::Execution("exit status 1: no provider".to_owned())),
        )
        .await;
    let runner = InitStepRunner::new(executor, version("1.5.7"));
    let context = project_context(CommandName::Plan);

    let output = runner
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await;

    assert_eq!(
        output,
        Err(AppError::Execution("exit status 1: no provider".to_owned()))
    );
}

#[tokio::test]
async fn plan_step_in_current_workspace_only_plans() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("workspace show", Ok("default\n".to_owned()))
        .await;
    executor
        .respond(
            "plan",
            Ok("Refreshing state...\nNo changes. Infrastructure is up-to-date.".to_owned()),
        )
        .await;
    let runner = PlanStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Plan);
    context.escaped_comment_args = vec!["\\-\\t\\a\\r\\g\\e\\t\\=\\x".to_owned()];

    let output = runner
        .run(
            &context,
            &["-var".to_owned(), "a=b".to_owned()],
            &work_dir(),
            &HashMap::new(),
        )
        .await;

    assert_eq!(
        output,
        Ok("No changes. Infrastructure is up-to-date.".to_owned())
    );
    let plan_file = quote_arg(&work_dir().join("default.tfplan"));
    assert_eq!(
        executor.commands().await,
        vec![
            "workspace show".to_owned(),
            format!(
                "plan -input=false -refresh -no-color -out {plan_file} -var a=b \\-\\t\\a\\r\\g\\e\\t\\=\\x"
            ),
        ]
    );
}

#[tokio::test]
async fn plan_step_creates_missing_workspace() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("workspace show", Ok("default\n".to_owned()))
        .await;
    executor
        .respond(
            "workspace select",
            Err(AppError::Execution("workspace not found".to_owned())),
        )
        .await;
    let runner = PlanStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Plan);
    context.workspace = "staging".to_owned();

    let output = runner
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await;

    assert!(output.is_ok());
    let commands = executor.commands().await;
    assert_eq!(
        &commands[..3],
        &[
            "workspace show".to_owned(),
            "workspace select staging".to_owned(),
            "workspace new staging".to_owned(),
        ]
    );
    assert!(commands[3].contains("staging.tfplan"));
}

#[tokio::test]
async fn plan_step_stops_when_workspace_cannot_be_created() {
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("workspace show", Ok("default".to_owned()))
        .await;
    executor
        .respond(
            "workspace",
            Err(AppError::Execution("backend locked".to_owned())),
        )
        .await;
    let runner = PlanStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Plan);
    context.workspace = "staging".to_owned();

    let output = runner
        .run(&context, &[], &work_dir(), &HashMap::new())
        .await;

    assert_eq!(output, Err(AppError::Execution("backend locked".to_owned())));
    assert_eq!(executor.commands().await.len(), 3);
}

#[test]
fn plan_output_moves_diff_markers_to_line_start() {
    let output = "Refreshing state... [id=vpc-1]\n\nTerraform used the selected providers to generate the following execution plan.\n\n  + resource \"aws_vpc\" \"main\" {\n  ~ tags = {}\n  - cidr = \"10.0.0.0/16\"\n";

    assert_eq!(
        format_plan_output(output),
        "Terraform used the selected providers to generate the following execution plan.\n\n+ resource \"aws_vpc\" \"main\" {\n~ tags = {}\n- cidr = \"10.0.0.0/16\"\n"
    );
}

#[test]
fn plan_output_without_markers_is_kept() {
    assert_eq!(format_plan_output("custom output"), "custom output");
}

#[tokio::test]
async fn apply_step_without_plan_file_fails() {
    let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let executor = Arc::new(FakeTerraformExecutor::default());
    let runner = ApplyStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Apply);
    context.repo_rel_dir = "network".to_owned();

    let output = runner
        .run(&context, &[], directory.path(), &HashMap::new())
        .await;

    assert_eq!(
        output,
        Err(AppError::Execution(
            "no plan found at path \"network\" and workspace \"default\"–did you run plan?"
                .to_owned()
        ))
    );
    assert!(executor.calls.lock().await.is_empty());
}

#[tokio::test]
async fn apply_step_applies_and_removes_plan_file() {
    let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let plan_file = directory.path().join("default.tfplan");
    assert!(tokio::fs::write(&plan_file, b"plan").await.is_ok());

    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("apply", Ok("Apply complete! Resources: 1 added.".to_owned()))
        .await;
    let runner = ApplyStepRunner::new(executor.clone(), version("1.5.7"));
    let mut context = project_context(CommandName::Apply);
    context.escaped_comment_args = vec!["\\-\\v\\a\\r".to_owned()];

    let output = runner
        .run(
            &context,
            &["-parallelism=2".to_owned()],
            directory.path(),
            &HashMap::new(),
        )
        .await;

    assert_eq!(output, Ok("Apply complete! Resources: 1 added.".to_owned()));
    assert_eq!(
        executor.commands().await,
        vec![format!(
            "apply -input=false -parallelism=2 \\-\\v\\a\\r {}",
            quote_arg(&plan_file)
        )]
    );
    assert!(!plan_file.exists());
}

#[tokio::test]
async fn apply_step_keeps_plan_file_when_apply_fails() {
    let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let plan_file = directory.path().join("default.tfplan");
    assert!(tokio::fs::write(&plan_file, b"plan").await.is_ok());

    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("apply", Err(AppError::Execution("apply failed".to_owned())))
        .await;
    let runner = ApplyStepRunner::new(executor, version("1.5.7"));
    let context = project_context(CommandName::Apply);

    let output = runner
        .run(&context, &[], directory.path(), &HashMap::new())
        .await;

    assert!(output.is_err());
    assert!(plan_file.exists());
}

#[tokio::test]
async fn show_step_writes_json_plan() {
    let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let executor = Arc::new(FakeTerraformExecutor::default());
    executor
        .respond("show", Ok("{\"format_version\":\"1.1\"}".to_owned()))
        .await;
    let runner = ShowStepRunner::new(executor.clone(), version("1.5.7"));
    let context = project_context(CommandName::PolicyCheck);

    let output = runner
        .run(&context, &[], directory.path(), &HashMap::new())
        .await;

    assert_eq!(output, Ok(String::new()));
    let written = tokio::fs::read_to_string(directory.path().join("default.json")).await;
    assert_eq!(
        written.unwrap_or_else(|_| unreachable!()),
        "{\"format_version\":\"1.1\"}"
    );
}

#[tokio::test]
async fn policy_check_step_passes_policy_sets_and_show_file() {
    let runner = Arc::new(FakeCustomStepRunner::default());
    let show_file = quote_arg(&work_dir().join("default.json"));
    let command_line = format!(
        "conftest test --policy \"/policies/base\" --all-namespaces {show_file}"
    );
    runner
        .respond(&command_line, Ok("2 tests, 2 passed\n".to_owned()))
        .await;
    let step = PolicyCheckStepRunner::new(
        runner.clone(),
        PolicyCheckSettings {
            command: Some("conftest test".to_owned()),
            policy_paths: vec![PathBuf::from("/policies/base")],
        },
    );
    let context = project_context(CommandName::PolicyCheck);

    let output = step
        .run(
            &context,
            &["--all-namespaces".to_owned()],
            &work_dir(),
            &HashMap::new(),
        )
        .await;

    assert_eq!(output, Ok("2 tests, 2 passed".to_owned()));
    assert!(runner.calls.lock().await[0].stream_output);
}

#[tokio::test]
async fn policy_check_step_requires_command() {
    let step = PolicyCheckStepRunner::new(
        Arc::new(FakeCustomStepRunner::default()),
        PolicyCheckSettings::default(),
    );
    let context = project_context(CommandName::PolicyCheck);

    let output = step.run(&context, &[], &work_dir(), &HashMap::new()).await;
    assert!(matches!(output, Err(AppError::Validation(_))));
}

#[test]
fn quote_arg_escapes_shell_metacharacters() {
    assert_eq!(
        quote_arg(Path::new("/tmp/my dir/$HOME\"x")),
        "\"/tmp/my dir/\\$HOME\\\"x\""
    );
}
