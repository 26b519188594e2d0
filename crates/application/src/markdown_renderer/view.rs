//! Render-ready view of a command result. Every branch is decided here so
//! the templates only format.

/// Whole report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReportView {
    pub(crate) body: ReportBody,
    /// Raw log appended in a disclosure when verbose.
    pub(crate) log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReportBody {
    CommandError {
        title: &'static str,
        error: String,
        approve_policies: bool,
    },
    CommandFailure {
        title: &'static str,
        failure: String,
    },
    SingleProject {
        title: &'static str,
        heading: ProjectHeading,
        body: ProjectBody,
        layout: SingleLayout,
    },
    MultiProject {
        title: &'static str,
        projects: Vec<(ProjectHeading, ProjectBody)>,
        rule_after_each: bool,
        apply_all_footer: bool,
    },
}

/// Shape of a report with exactly one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SingleLayout {
    /// Successful plan or policy check, optionally followed by the apply-all footer.
    Plan { apply_all_footer: bool },
    /// Failed plan, policy check or version. The heading omits the project name.
    Unsuccessful,
    /// Apply and successful version output.
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProjectHeading {
    pub(crate) project_name: Option<String>,
    pub(crate) dir: String,
    pub(crate) workspace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProjectBody {
    Plan {
        output: String,
        next_steps: NextSteps,
        folded: bool,
        /// Hoisted below the disclosure when folded. Empty for policy checks.
        summary: String,
        diverged: bool,
    },
    Output {
        output: String,
        diff: bool,
        folded: bool,
    },
    Error {
        title: &'static str,
        error: String,
        folded: bool,
        approve_policies: bool,
    },
    Failure {
        title: &'static str,
        failure: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NextSteps {
    /// Automerge discarded every plan of the pull request.
    PlanDiscarded,
    Hints {
        apply_cmd: Option<String>,
        lock_url: Option<String>,
        re_plan_cmd: String,
        re_run_policies: bool,
    },
}
