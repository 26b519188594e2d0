use plangate_domain::{CommandResult, ProjectOutcome, ProjectResult};

use crate::ProjectContext;

/// Error shown for a project whose worker never reported back.
pub const INCOMPLETE_PROJECT_ERROR: &str = "project command did not complete";

/// Collects per-project results into one [`CommandResult`] in build order.
///
/// Every slot starts as an error so a worker that dies leaves a visible result.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    results: Vec<ProjectResult>,
}

impl ResultAggregator {
    /// Creates one placeholder slot per context.
    #[must_use]
    pub fn new(contexts: &[ProjectContext]) -> Self {
        let results = contexts
            .iter()
            .map(|context| ProjectResult {
                command: context.command_name,
                workspace: context.workspace.clone(),
                repo_rel_dir: context.repo_rel_dir.clone(),
                project_name: context.project_name.clone(),
                outcome: ProjectOutcome::Error(INCOMPLETE_PROJECT_ERROR.to_owned()),
            })
            .collect();

        Self { results }
    }

    /// Stores the result of the context at `index`. Out of range indexes are ignored.
    pub fn record(&mut self, index: usize, result: ProjectResult) {
        if let Some(slot) = self.results.get_mut(index) {
            *slot = result;
        }
    }

    /// Returns whether any recorded project failed or errored.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|result| !result.is_successful())
    }

    /// Consumes the aggregator into the command result.
    #[must_use]
    pub fn finish(self) -> CommandResult {
        CommandResult {
            project_results: self.results,
            ..CommandResult::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use plangate_domain::{CommandName, ProjectOutcome, ProjectResult};

    use crate::test_support::project_context;

    use super::{INCOMPLETE_PROJECT_ERROR, ResultAggregator};

    fn result(dir: &str, outcome: ProjectOutcome) -> ProjectResult {
        ProjectResult {
            command: CommandName::Plan,
            workspace: "default".to_owned(),
            repo_rel_dir: dir.to_owned(),
            project_name: None,
            outcome,
        }
    }

    #[test]
    fn results_keep_build_order_regardless_of_completion_order() {
        let mut first = project_context(CommandName::Plan);
        first.repo_rel_dir = "network".to_owned();
        let mut second = project_context(CommandName::Plan);
        second.repo_rel_dir = "database".to_owned();
        let mut aggregator = ResultAggregator::new(&[first, second]);

        aggregator.record(1, result("database", ProjectOutcome::ApplySuccess("b".to_owned())));
        aggregator.record(0, result("network", ProjectOutcome::ApplySuccess("a".to_owned())));

        let command_result = aggregator.finish();
        let dirs = command_result
            .project_results
            .iter()
            .map(|result| result.repo_rel_dir.as_str())
            .collect::<Vec<_>>();
        assert_eq!(dirs, vec!["network", "database"]);
        assert!(!command_result.has_errors());
    }

    #[test]
    fn unreported_projects_stay_errors() {
        let aggregator = ResultAggregator::new(&[project_context(CommandName::Apply)]);
        assert!(aggregator.has_errors());

        let command_result = aggregator.finish();
        assert_eq!(
            command_result.project_results[0].outcome,
            ProjectOutcome::Error(INCOMPLETE_PROJECT_ERROR.to_owned())
        );
        assert_eq!(command_result.project_results[0].command, CommandName::Apply);
    }

    #[test]
    fn record_ignores_unknown_index() {
        let mut aggregator = ResultAggregator::new(&[]);
        aggregator.record(3, result(".", ProjectOutcome::Failure("x".to_owned())));

        assert!(aggregator.finish().project_results.is_empty());
    }
}
