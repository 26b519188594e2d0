use std::fmt::Write;

use super::view::{NextSteps, ProjectBody, ProjectHeading, ReportBody, ReportView, SingleLayout};

const APPROVE_POLICIES: &str = "\n* :heavy_check_mark: To **approve** failing policies an authorized approver can comment:\n    * `atlantis approve_policies`\n* :repeat: Or, address the policy failure by modifying the codebase and re-planning.\n";

const RULE: &str = "---\n";

const APPLY_ALL_FOOTER: &str = "* :fast_forward: To **apply** all unapplied plans from this pull request, comment:\n    * `atlantis apply`\n* :put_litter_in_its_place: To delete all plans and locks for the PR, comment:\n    * `atlantis unlock`";

const PLAN_DISCARDED: &str =
    "This plan was not saved because one or more projects failed and automerge requires all plans pass.";

const DIVERGED_WARNING: &str = "\n\n:warning: The branch we're merging into is ahead, it is recommended to pull new commits first.";

const SHOW_OUTPUT_OPEN: &str = "<details><summary>Show Output</summary>\n\n";

/// Formats the final report text. The output always ends with a newline.
pub(crate) fn render_report(view: &ReportView) -> String {
    let mut report = match &view.body {
        ReportBody::CommandError {
            title,
            error,
            approve_policies,
        } => {
            let mut text = format!("**{title} Error**\n```\n{error}\n```");
            if *approve_policies {
                text.push_str(APPROVE_POLICIES);
            }
            text
        }
        ReportBody::CommandFailure { title, failure } => format!("**{title} Failed**: {failure}"),
        ReportBody::SingleProject {
            title,
            heading,
            body,
            layout,
        } => single_project(title, heading, body, *layout),
        ReportBody::MultiProject {
            title,
            projects,
            rule_after_each,
            apply_all_footer,
        } => multi_project(title, projects, *rule_after_each, *apply_all_footer),
    };

    if let Some(log) = &view.log {
        let _ = write!(
            report,
            "\n<details><summary>Log</summary>\n  <p>\n\n```\n{log}```\n</p></details>"
        );
    }

    report.push('\n');
    report
}

fn single_project(
    title: &str,
    heading: &ProjectHeading,
    body: &ProjectBody,
    layout: SingleLayout,
) -> String {
    let body = project_body(body);
    match layout {
        SingleLayout::Plan { apply_all_footer } => {
            let mut text = format!("Ran {title} for {}\n\n{body}\n\n", heading_text(heading));
            if apply_all_footer {
                text.push_str(RULE);
                text.push_str(APPLY_ALL_FOOTER);
            }
            text
        }
        SingleLayout::Unsuccessful => format!(
            "Ran {title} for dir: `{}` workspace: `{}`\n\n{body}\n",
            heading.dir, heading.workspace
        ),
        SingleLayout::Output => format!("Ran {title} for {}\n\n{body}\n", heading_text(heading)),
    }
}

fn multi_project(
    title: &str,
    projects: &[(ProjectHeading, ProjectBody)],
    rule_after_each: bool,
    apply_all_footer: bool,
) -> String {
    let mut text = format!("Ran {title} for {} projects:\n\n", projects.len());
    for (heading, _) in projects {
        let _ = writeln!(text, "1. {}", heading_text(heading));
    }
    text.push('\n');

    for (index, (heading, body)) in projects.iter().enumerate() {
        let _ = write!(
            text,
            "### {}. {}\n{}\n\n",
            index + 1,
            heading_text(heading),
            project_body(body)
        );
        if rule_after_each {
            text.push_str(RULE);
        }
    }

    // The rule after the last project doubles as the footer separator.
    if apply_all_footer {
        text.push_str(APPLY_ALL_FOOTER);
    }

    text
}

fn heading_text(heading: &ProjectHeading) -> String {
    let mut text = String::new();
    if let Some(name) = &heading.project_name {
        let _ = write!(text, "project: `{name}` ");
    }
    let _ = write!(
        text,
        "dir: `{}` workspace: `{}`",
        heading.dir, heading.workspace
    );
    text
}

fn project_body(body: &ProjectBody) -> String {
    match body {
        ProjectBody::Plan {
            output,
            next_steps,
            folded,
            summary,
            diverged,
        } => {
            let next_steps = next_steps_text(next_steps);
            let mut text = if *folded {
                format!("{SHOW_OUTPUT_OPEN}```diff\n{output}\n```\n\n{next_steps}\n</details>")
            } else {
                format!("```diff\n{output}\n```\n\n{next_steps}")
            };
            if *folded && !summary.is_empty() {
                text.push('\n');
                text.push_str(summary);
            }
            if *diverged {
                text.push_str(DIVERGED_WARNING);
            }
            text
        }
        ProjectBody::Output {
            output,
            diff,
            folded,
        } => {
            let fence = if *diff { "```diff" } else { "```" };
            if *folded {
                format!("{SHOW_OUTPUT_OPEN}{fence}\n{output}\n```\n</details>")
            } else {
                format!("{fence}\n{output}\n```")
            }
        }
        ProjectBody::Error {
            title,
            error,
            folded,
            approve_policies,
        } => {
            let mut text = if *folded {
                format!("**{title} Error**\n{SHOW_OUTPUT_OPEN}```\n{error}\n```\n</details>")
            } else {
                format!("**{title} Error**\n```\n{error}\n```")
            };
            if *approve_policies {
                text.push_str(APPROVE_POLICIES);
            }
            text
        }
        ProjectBody::Failure { title, failure } => format!("**{title} Failed**: {failure}"),
    }
}

fn next_steps_text(next_steps: &NextSteps) -> String {
    match next_steps {
        NextSteps::PlanDiscarded => PLAN_DISCARDED.to_owned(),
        NextSteps::Hints {
            apply_cmd,
            lock_url,
            re_plan_cmd,
            re_run_policies,
        } => {
            let mut text = String::new();
            if let Some(apply_cmd) = apply_cmd {
                let _ = writeln!(
                    text,
                    "* :arrow_forward: To **apply** this plan, comment:\n    * `{apply_cmd}`"
                );
            }
            if let Some(lock_url) = lock_url {
                let _ = writeln!(
                    text,
                    "* :put_litter_in_its_place: To **delete** this plan click [here]({lock_url})"
                );
            }
            if *re_run_policies {
                let _ = write!(
                    text,
                    "* :repeat: To re-run policies **plan** this project again by commenting:\n    * `{re_plan_cmd}`"
                );
            } else {
                let _ = write!(
                    text,
                    "* :repeat: To **plan** this project again, comment:\n    * `{re_plan_cmd}`"
                );
            }
            text
        }
    }
}
