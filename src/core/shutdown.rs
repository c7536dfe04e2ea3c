//! Ctrl+C handling.

use tokio_util::sync::CancellationToken;

/// Install the global Ctrl+C handler.
///
/// The first signal cancels `token` so every component winds down
/// cooperatively; a second signal exits immediately.
pub fn setup_shutdown_handler(token: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        crate::log!("run"; "shutting down...");
        token.cancel();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}
