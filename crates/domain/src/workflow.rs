use plangate_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::CommandName;

/// One executable unit inside a workflow stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Initialise the working directory (`init -input=false`).
    Init {
        /// Extra arguments appended to the tool invocation.
        #[serde(default)]
        extra_args: Vec<String>,
    },
    /// Compute a plan into the project plan file.
    Plan {
        /// Extra arguments appended to the tool invocation.
        #[serde(default)]
        extra_args: Vec<String>,
    },
    /// Render the plan file as JSON for policy evaluation.
    Show,
    /// Evaluate policies against the JSON plan.
    PolicyCheck {
        /// Extra arguments appended to the policy command.
        #[serde(default)]
        extra_args: Vec<String>,
    },
    /// Apply the saved plan file.
    Apply {
        /// Extra arguments appended to the tool invocation.
        #[serde(default)]
        extra_args: Vec<String>,
    },
    /// Print the tool version.
    Version,
    /// Run a custom shell command.
    Run {
        /// Shell command passed to `sh -c`.
        command: String,
    },
    /// Compute an environment variable consumed by later steps.
    Env {
        /// Variable name.
        name: String,
        /// Shell command whose trimmed output becomes the value.
        #[serde(default)]
        command: Option<String>,
        /// Literal value used instead of running a command.
        #[serde(default)]
        value: Option<String>,
    },
}

impl WorkflowStep {
    /// Returns stable step type value.
    #[must_use]
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Plan { .. } => "plan",
            Self::Show => "show",
            Self::PolicyCheck { .. } => "policy_check",
            Self::Apply { .. } => "apply",
            Self::Version => "version",
            Self::Run { .. } => "run",
            Self::Env { .. } => "env",
        }
    }
}

/// Named set of step sequences, one per command stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    name: String,
    plan: Vec<WorkflowStep>,
    policy_check: Vec<WorkflowStep>,
    apply: Vec<WorkflowStep>,
    version: Vec<WorkflowStep>,
}

/// Input payload used to construct a validated workflow.
///
/// Stages left as `None` fall back to the default steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Workflow name referenced by projects.
    pub name: String,
    /// Plan stage steps.
    #[serde(default)]
    pub plan: Option<Vec<WorkflowStep>>,
    /// Policy check stage steps.
    #[serde(default)]
    pub policy_check: Option<Vec<WorkflowStep>>,
    /// Apply stage steps.
    #[serde(default)]
    pub apply: Option<Vec<WorkflowStep>>,
}

impl Workflow {
    /// Name of the workflow used when a project does not select one.
    pub const DEFAULT_NAME: &'static str = "default";

    /// Creates a validated workflow.
    pub fn new(input: WorkflowInput) -> AppResult<Self> {
        let WorkflowInput {
            name,
            plan,
            policy_check,
            apply,
        } = input;

        let plan = plan.unwrap_or_else(default_plan_steps);
        let policy_check = policy_check.unwrap_or_else(default_policy_check_steps);
        let apply = apply.unwrap_or_else(default_apply_steps);

        validate_stage("plan", &plan)?;
        validate_stage("policy_check", &policy_check)?;
        validate_stage("apply", &apply)?;

        Ok(Self {
            name: NonEmptyString::new(name)?.into(),
            plan,
            policy_check,
            apply,
            version: vec![WorkflowStep::Version],
        })
    }

    /// Returns the built-in workflow: `init, plan` / `show, policy_check` / `apply`.
    #[must_use]
    pub fn default_workflow() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_owned(),
            plan: default_plan_steps(),
            policy_check: default_policy_check_steps(),
            apply: default_apply_steps(),
            version: vec![WorkflowStep::Version],
        }
    }

    /// Returns workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the steps executed for a command. Unlock has no steps.
    #[must_use]
    pub fn steps(&self, command: CommandName) -> &[WorkflowStep] {
        match command {
            CommandName::Plan => &self.plan,
            CommandName::PolicyCheck => &self.policy_check,
            CommandName::Apply => &self.apply,
            CommandName::Version => &self.version,
            CommandName::Unlock => &[],
        }
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::default_workflow()
    }
}

fn default_plan_steps() -> Vec<WorkflowStep> {
    vec![
        WorkflowStep::Init {
            extra_args: Vec::new(),
        },
        WorkflowStep::Plan {
            extra_args: Vec::new(),
        },
    ]
}

fn default_policy_check_steps() -> Vec<WorkflowStep> {
    vec![
        WorkflowStep::Show,
        WorkflowStep::PolicyCheck {
            extra_args: Vec::new(),
        },
    ]
}

fn default_apply_steps() -> Vec<WorkflowStep> {
    vec![WorkflowStep::Apply {
        extra_args: Vec::new(),
    }]
}

fn validate_stage(stage: &str, steps: &[WorkflowStep]) -> AppResult<()> {
    if steps.is_empty() {
        return Err(AppError::Validation(format!(
            "workflow {stage} stage must include at least one step"
        )));
    }

    for step in steps {
        validate_step(stage, step)?;
    }

    Ok(())
}

fn validate_step(stage: &str, step: &WorkflowStep) -> AppResult<()> {
    match step {
        WorkflowStep::Run { command } => {
            if command.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "run step in {stage} stage requires a non-empty command"
                )));
            }

            Ok(())
        }
        WorkflowStep::Env {
            name,
            command,
            value,
        } => {
            if name.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "env step in {stage} stage requires a name"
                )));
            }

            match (command, value) {
                (Some(_), Some(_)) => Err(AppError::Validation(format!(
                    "env step '{name}' must not set both command and value"
                ))),
                (None, None) => Err(AppError::Validation(format!(
                    "env step '{name}' requires a command or a value"
                ))),
                (Some(command), None) if command.trim().is_empty() => Err(AppError::Validation(
                    format!("env step '{name}' command must not be empty"),
                )),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Workflow, WorkflowInput, WorkflowStep};
    use crate::CommandName;

    #[test]
    fn default_workflow_runs_init_then_plan() {
        let workflow = Workflow::default_workflow();
        let steps = workflow
            .steps(CommandName::Plan)
            .iter()
            .map(WorkflowStep::step_type)
            .collect::<Vec<_>>();

        assert_eq!(steps, vec!["init", "plan"]);
        assert_eq!(workflow.steps(CommandName::Version), &[WorkflowStep::Version]);
        assert!(workflow.steps(CommandName::Unlock).is_empty());
    }

    #[test]
    fn missing_stages_fall_back_to_defaults() {
        let workflow = Workflow::new(WorkflowInput {
            name: "custom".to_owned(),
            plan: Some(vec![WorkflowStep::Run {
                command: "make plan".to_owned(),
            }]),
            ..WorkflowInput::default()
        });
        assert!(workflow.is_ok());

        let workflow = workflow.unwrap_or_else(|_| unreachable!());
        assert_eq!(workflow.name(), "custom");
        assert_eq!(workflow.steps(CommandName::Plan).len(), 1);
        assert_eq!(workflow.steps(CommandName::Apply).len(), 1);
    }

    #[test]
    fn env_step_requires_exactly_one_source() {
        let both = Workflow::new(WorkflowInput {
            name: "custom".to_owned(),
            plan: Some(vec![WorkflowStep::Env {
                name: "TF_VAR_region".to_owned(),
                command: Some("echo eu-west-1".to_owned()),
                value: Some("eu-west-1".to_owned()),
            }]),
            ..WorkflowInput::default()
        });
        assert!(both.is_err());

        let neither = Workflow::new(WorkflowInput {
            name: "custom".to_owned(),
            plan: Some(vec![WorkflowStep::Env {
                name: "TF_VAR_region".to_owned(),
                command: None,
                value: None,
            }]),
            ..WorkflowInput::default()
        });
        assert!(neither.is_err());
    }

    #[test]
    fn empty_stage_is_rejected() {
        let workflow = Workflow::new(WorkflowInput {
            name: "custom".to_owned(),
            apply: Some(Vec::new()),
            ..WorkflowInput::default()
        });
        assert!(workflow.is_err());
    }

    #[test]
    fn steps_deserialize_from_tagged_json() {
        let parsed: Result<Vec<WorkflowStep>, _> = serde_json::from_str(
            r#"[{"type":"init"},{"type":"env","name":"A","value":"1"},{"type":"run","command":"ls"}]"#,
        );
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_else(|_| unreachable!()).len(), 3);
    }
}
