//! Post-processing tools run after each successful compile pass.

use std::sync::Arc;

use super::Orchestrator;
use crate::config::ProjectConfig;
use crate::core::BuildMode;
use crate::supervisor::{ProcessError, ProcessSupervisor, tool_specs};

/// Register every active tool; returns their names in run order.
pub(super) fn register_tools(
    supervisor: &Arc<ProcessSupervisor>,
    config: &ProjectConfig,
    mode: BuildMode,
) -> Result<Vec<String>, ProcessError> {
    tool_specs(config, mode)
        .into_iter()
        .map(|spec| {
            let name = spec.name.clone();
            supervisor.register(spec)?;
            Ok(name)
        })
        .collect()
}

impl Orchestrator {
    /// Run each tool to completion, in order. The first failure stops the rest.
    pub async fn run_post_tools(&self) -> Result<(), ProcessError> {
        for name in &self.tools {
            crate::debug!("tool"; "running `{}`", name);
            self.supervisor.run_to_completion(name).await?;
        }
        Ok(())
    }
}
