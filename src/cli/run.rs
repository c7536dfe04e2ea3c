//! Run mode entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::{
    compiler::{Compiler, ExternalCompiler},
    config::ProjectConfig,
    core::setup_shutdown_handler,
    debug,
    orchestrator::run_session,
};

/// Build once, then keep rebuilding on changes until Ctrl+C.
pub async fn run_project(config: Arc<ProjectConfig>) -> Result<()> {
    let cancel = CancellationToken::new();
    setup_shutdown_handler(cancel.clone())?;

    let compiler: Arc<dyn Compiler> = Arc::new(ExternalCompiler::new(&config));
    run_session(config, compiler, cancel, |reload| {
        debug!("run"; "live reload ready ({} clients)", reload.client_count());
    })
    .await
    .context("run mode stopped")
}
