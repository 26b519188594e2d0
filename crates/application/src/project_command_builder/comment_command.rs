use plangate_domain::CommandName;

use crate::DEFAULT_WORKSPACE;

const EXECUTABLE_NAME: &str = "atlantis";

/// Builds the comment that re-runs `command` for one project.
///
/// Named projects are addressed with `-p`; otherwise by `-d`, plus `-w` unless
/// the workspace is the default. Comment args follow `--`.
pub(crate) fn build_comment(
    command: CommandName,
    repo_rel_dir: &str,
    workspace: &str,
    project_name: Option<&str>,
    comment_args: &[String],
) -> String {
    let mut comment = format!("{EXECUTABLE_NAME} {command}");
    match project_name.filter(|name| !name.is_empty()) {
        Some(name) => {
            comment.push_str(" -p ");
            comment.push_str(name);
        }
        None => {
            comment.push_str(" -d ");
            if repo_rel_dir.contains(' ') {
                comment.push_str(&format!("{repo_rel_dir:?}"));
            } else {
                comment.push_str(repo_rel_dir);
            }
            if workspace != DEFAULT_WORKSPACE {
                comment.push_str(" -w ");
                comment.push_str(workspace);
            }
        }
    }

    if !comment_args.is_empty() {
        comment.push_str(" -- ");
        comment.push_str(&comment_args.join(" "));
    }

    comment
}

/// Backslash-escapes every character so the args pass through `sh -c` verbatim.
pub(crate) fn escape_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut escaped = String::with_capacity(arg.len() * 2);
            for character in arg.chars() {
                escaped.push('\\');
                escaped.push(character);
            }
            escaped
        })
        .collect()
}
