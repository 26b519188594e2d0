use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use plangate_core::AppResult;
use plangate_domain::ToolVersion;
use tracing::info;

use super::{StepRunner, effective_version};
use crate::ProjectContext;

/// Skips the wrapped step when the effective tool version is too old.
///
/// The skip is reported as the step output, not as an error, so the other
/// projects of a batch keep running.
#[derive(Clone)]
pub struct MinimumVersionStepRunner {
    delegate: Arc<dyn StepRunner>,
    minimum_version: ToolVersion,
    default_version: ToolVersion,
}

impl MinimumVersionStepRunner {
    /// Wraps `delegate` with a minimum version requirement.
    #[must_use]
    pub fn new(
        delegate: Arc<dyn StepRunner>,
        minimum_version: ToolVersion,
        default_version: ToolVersion,
    ) -> Self {
        Self {
            delegate,
            minimum_version,
            default_version,
        }
    }
}

#[async_trait]
impl StepRunner for MinimumVersionStepRunner {
    async fn run(
        &self,
        context: &ProjectContext,
        extra_args: &[String],
        path: &Path,
        envs: &HashMap<String, String>,
    ) -> AppResult<String> {
        let version = effective_version(context, &self.default_version);
        if version < &self.minimum_version {
            info!(
                version = %version,
                minimum_version = %self.minimum_version,
                "skipping step below minimum tool version"
            );
            return Ok(format!(
                "Version: {version} is unsupported for this step. Minimum version is: {}",
                self.minimum_version
            ));
        }

        self.delegate.run(context, extra_args, path, envs).await
    }
}
