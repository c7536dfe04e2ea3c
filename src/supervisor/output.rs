//! Child output capture.
//!
//! Each stream gets a reader task and a consumer on a blocking thread,
//! joined by a bounded channel. The reader only ever `try_send`s, so a slow
//! handler costs dropped lines, never a stalled pipe.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::exec::FilterRule;

/// Callback for one line of child output (newline stripped).
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Lines buffered between a reader and its handler.
const LINE_BUFFER: usize = 1024;

/// Consecutive read errors after which a stream counts as closed.
const MAX_READ_ERRORS: u32 = 16;

/// Handler that logs each line under `name`, after `filter`.
pub fn log_handler(name: impl Into<String>, filter: &'static FilterRule) -> LineHandler {
    let name = name.into();
    Arc::new(move |line: &str| {
        if let Some(line) = filter.apply(line) {
            crate::log!(&name; "{}", line);
        }
    })
}

/// Read `reader` to EOF, handing every line to `handler`.
///
/// Lines are split on raw bytes and decoded lossily, so output that is not
/// UTF-8 never ends the read loop. The returned task completes once the
/// stream is closed and every buffered line has been handled.
pub(super) fn forward_lines<R>(reader: R, handler: Option<LineHandler>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);

        let Some(handler) = handler else {
            // Drain so the child never blocks on a full pipe
            let mut buf = Vec::new();
            while next_line(&mut reader, &mut buf).await.is_some() {}
            return;
        };

        let (tx, mut rx) = mpsc::channel::<String>(LINE_BUFFER);
        let consumer = tokio::task::spawn_blocking(move || {
            while let Some(line) = rx.blocking_recv() {
                handler(&line);
            }
        });

        let mut buf = Vec::new();
        let mut dropped = 0usize;
        while let Some(line) = next_line(&mut reader, &mut buf).await {
            if tx.try_send(line).is_err() {
                dropped += 1;
            }
        }
        drop(tx);

        if consumer.await.is_err() {
            crate::log!("process"; "output handler panicked");
        }
        if dropped > 0 {
            crate::debug!("process"; "{} output lines dropped by a slow handler", dropped);
        }
    })
}

/// Next line without its terminator, or `None` at EOF.
///
/// Read errors are logged and skipped; only a run of them in a row is
/// treated as a closed stream.
async fn next_line<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut errors = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', buf).await {
            Ok(0) => return None,
            Ok(_) => {
                let mut line = buf.as_slice();
                line = line.strip_suffix(b"\n").unwrap_or(line);
                line = line.strip_suffix(b"\r").unwrap_or(line);
                return Some(String::from_utf8_lossy(line).into_owned());
            }
            Err(e) => {
                errors += 1;
                crate::debug!("process"; "output read error: {}", e);
                if errors >= MAX_READ_ERRORS {
                    return None;
                }
            }
        }
    }
}
