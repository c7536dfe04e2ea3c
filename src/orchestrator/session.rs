//! Run mode: full build, then rebuild on every settled batch of changes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BuildError, Orchestrator};
use crate::bus::EventBus;
use crate::compiler::Compiler;
use crate::config::ProjectConfig;
use crate::core::BuildMode;
use crate::reload::ReloadChannel;
use crate::supervisor::ProcessSupervisor;
use crate::watcher::FileWatcher;

const CHANNEL_BUFFER: usize = 32;

/// Wire up the bus, supervisor, watcher and orchestrator, and run until
/// `cancel` fires or the watcher fails for good.
///
/// Returns the live-reload channel through `on_ready` so a dev server can
/// subscribe before the first build completes.
pub async fn run_session(
    config: Arc<ProjectConfig>,
    compiler: Arc<dyn Compiler>,
    cancel: CancellationToken,
    on_ready: impl FnOnce(&ReloadChannel),
) -> Result<(), BuildError> {
    let bus = Arc::new(EventBus::new(config.bus.capacity));
    bus.start();
    let reload = ReloadChannel::attach(&bus);
    on_ready(&reload);

    let supervisor = Arc::new(ProcessSupervisor::new(Some(Arc::clone(&bus))));

    // Watcher first: edits made during the initial build are buffered
    let (changes_tx, mut changes_rx) = mpsc::channel(CHANNEL_BUFFER);
    let watcher = FileWatcher::new(&config, Arc::clone(&bus), changes_tx)?;

    let mut orchestrator = Orchestrator::new(
        Arc::clone(&config),
        compiler,
        Arc::clone(&bus),
        Arc::clone(&supervisor),
        BuildMode::Run,
    )?;

    match orchestrator.full_build().await {
        Ok(summary) => crate::log!("build"; "{}", summary),
        Err(e) => {
            crate::logger::status_error("initial build failed", &e.to_string());
            orchestrator.errors.report_error(&e.to_string());
        }
    }

    let watch_task = tokio::spawn(watcher.run(cancel.clone()));
    crate::log!("watch"; "watching for changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            batch = changes_rx.recv() => match batch {
                Some(changes) => {
                    orchestrator.handle_changes(changes).await;
                }
                // Watcher ended; its result says why
                None => break,
            }
        }
    }

    cancel.cancel();
    let watched = match watch_task.await {
        Ok(result) => result.map_err(BuildError::from),
        Err(e) => {
            crate::debug!("watch"; "watcher task ended abnormally: {}", e);
            Ok(())
        }
    };

    supervisor.stop_all().await;
    reload.detach(&bus);
    bus.stop().await;
    crate::debug!("run"; "session stopped");
    watched
}
