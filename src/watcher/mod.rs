//! File watcher.
//!
//! Watches the page and component roots (and `jml.toml`), coalesces bursts
//! of events per path, and hands each settled batch to the orchestrator.
//!
//! ```text
//! notify ─► bridge thread ─► Debouncer (timing) ─► PathFilter (relevance,
//!           on-disk reconciliation) ─┬─► EventBus  file.created/modified/removed
//!                                    └─► orchestrator  Vec<FileChange>
//! ```
//!
//! The watcher is created before the initial build so that edits made
//! while it runs are buffered rather than lost.

mod debouncer;
mod filter;
mod roots;
mod types;


use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bus::{Event, EventBus};
use crate::config::ProjectConfig;
use debouncer::Debouncer;
use filter::PathFilter;
use roots::WatchRoots;

pub use types::{ChangeKind, FileChange};

/// Consecutive notify errors tolerated before giving up.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Upper bound on idle sleeps, so missing roots are noticed.
const ROOT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to start watcher: {0}")]
    Init(#[from] notify::Error),

    #[error("watcher failed {count} times in a row, last: {last}")]
    Persistent { count: u32, last: String },

    #[error("watcher event source closed")]
    Closed,
}

type NotifyResult = notify::Result<notify::Event>;

pub struct FileWatcher {
    /// Sync side of notify, bridged to async in `run`
    notify_rx: std::sync::mpsc::Receiver<NotifyResult>,
    /// Must stay alive for events to flow
    watcher: RecommendedWatcher,
    roots: WatchRoots,
    debouncer: Debouncer,
    filter: PathFilter,
    bus: Arc<EventBus>,
    changes_tx: mpsc::Sender<Vec<FileChange>>,
}

impl FileWatcher {
    /// Start watching immediately; events buffer until `run` is awaited.
    pub fn new(
        config: &ProjectConfig,
        bus: Arc<EventBus>,
        changes_tx: mpsc::Sender<Vec<FileChange>>,
    ) -> Result<Self, WatcherError> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut roots = WatchRoots::new(vec![
            config.build.pages.clone(),
            config.build.components.clone(),
            config.config_path.clone(),
        ]);
        roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "watching {} roots", roots.attached_count());

        Ok(Self {
            notify_rx,
            watcher,
            roots,
            debouncer: Debouncer::new(config.watch.debounce()),
            filter: PathFilter::new(config),
            bus,
            changes_tx,
        })
    }

    /// Drive the watch loop until cancelled or the receiver goes away.
    ///
    /// Fails only when change detection is no longer possible.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), WatcherError> {
        let Self {
            notify_rx,
            mut watcher,
            mut roots,
            mut debouncer,
            filter,
            bus,
            changes_tx,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<NotifyResult>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                if async_tx.blocking_send(result).is_err() {
                    break;
                }
            }
        });

        let mut errors = 0u32;
        loop {
            let idle = debouncer.sleep_duration().min(ROOT_CHECK_INTERVAL);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                received = async_rx.recv() => match received {
                    Some(Ok(event)) => {
                        errors = 0;
                        debouncer.add_event(&event);
                    }
                    Some(Err(e)) => {
                        errors += 1;
                        crate::log!("watch"; "notify error: {}", e);
                        if errors > MAX_CONSECUTIVE_ERRORS {
                            return Err(WatcherError::Persistent {
                                count: errors,
                                last: e.to_string(),
                            });
                        }
                    }
                    None => return Err(WatcherError::Closed),
                },
                _ = tokio::time::sleep(idle) => {
                    roots.maintain(&mut watcher);

                    let Some(raw) = debouncer.take_if_ready() else {
                        continue;
                    };
                    let changes = filter.classify(raw);
                    if changes.is_empty() {
                        continue;
                    }

                    for change in &changes {
                        bus.publish(
                            Event::new(change.kind.event_type(), "watcher").with_path(&change.path),
                        );
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        sent = changes_tx.send(changes) => {
                            if sent.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
}
