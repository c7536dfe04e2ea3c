//! One-shot build: compile every document in dependency order, then run
//! the configured tools once.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    bus::EventBus,
    compiler::{Compiler, ExternalCompiler},
    config::ProjectConfig,
    core::BuildMode,
    log,
    orchestrator::Orchestrator,
    supervisor::ProcessSupervisor,
};

/// Build the project described by `config`.
///
/// The first compile failure aborts the build; its diagnostics are in the
/// returned error.
pub async fn build_project(config: Arc<ProjectConfig>) -> Result<()> {
    let bus = Arc::new(EventBus::new(config.bus.capacity));
    bus.start();
    let supervisor = Arc::new(ProcessSupervisor::new(Some(Arc::clone(&bus))));
    let compiler: Arc<dyn Compiler> = Arc::new(ExternalCompiler::new(&config));

    let result = async {
        let mut orchestrator = Orchestrator::new(
            Arc::clone(&config),
            compiler,
            Arc::clone(&bus),
            Arc::clone(&supervisor),
            BuildMode::Build,
        )?;
        orchestrator.full_build().await
    }
    .await;

    supervisor.stop_all().await;
    bus.stop().await;

    let summary = result.context("build failed")?;
    log!("build"; "{} into {}", summary, config.root_relative(config.output_dir()));
    Ok(())
}
