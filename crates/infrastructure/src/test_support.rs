use std::sync::{Mutex, PoisonError};

use plangate_application::{JobMessageSender, ProjectContext};
use plangate_domain::{
    CommandName, PullRequest, PullRequestState, Repo, User, VcsHostType, Workflow,
};
use tracing::Span;
use uuid::Uuid;

pub(crate) fn project_context() -> ProjectContext {
    let repo = Repo::new("acme/infra", "github.com", VcsHostType::Github)
        .unwrap_or_else(|_| unreachable!());

    ProjectContext {
        command_name: CommandName::Plan,
        base_repo: repo.clone(),
        head_repo: repo.clone(),
        pull: PullRequest {
            num: 1,
            head_commit: "5e1c2a9".to_owned(),
            url: "https://github.com/acme/infra/pull/1".to_owned(),
            head_branch: "feature".to_owned(),
            base_branch: "main".to_owned(),
            author: "octocat".to_owned(),
            state: PullRequestState::Open,
            base_repo: repo,
        },
        user: User::new("octocat"),
        workspace: "default".to_owned(),
        repo_rel_dir: ".".to_owned(),
        project_name: None,
        terraform_version: None,
        escaped_comment_args: Vec::new(),
        workflow: Workflow::default_workflow(),
        repo_locking: true,
        apply_cmd: "atlantis apply -d .".to_owned(),
        re_plan_cmd: "atlantis plan -d .".to_owned(),
        verbose: false,
        job_id: Uuid::new_v4(),
        span: Span::none(),
    }
}

/// Job output fake keeping every streamed line.
#[derive(Default)]
pub(crate) struct RecordingJobSender {
    lines: Mutex<Vec<String>>,
}

impl RecordingJobSender {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl JobMessageSender for RecordingJobSender {
    fn send(&self, _context: &ProjectContext, line: &str, _is_final: bool) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}
