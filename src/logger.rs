//! Terminal output: prefixed log lines, the run-mode status block and the
//! full-build progress counter.
//!
//! All three share one [`Terminal`] lock that knows what currently sits at
//! the bottom of the screen, so a log line printed mid-build lands above
//! the progress counter and a new status block only ever overwrites the
//! previous status block.
//!
//! ```ignore
//! log!("deps"; "{} imports unknown document {}", page, import);
//! debug!("compile"; "{} {}", kind, path);
//!
//! status_error("build failed (2 errors)", &details);
//!
//! let progress = ProgressLine::new(&[("component", 12), ("page", 4)]);
//! progress.inc("page");
//! progress.finish();
//! ```

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossterm::{
    cursor, queue,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set once from `--verbose`.
pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print `[module] message`.
///
/// ```ignore
/// log!("watch"; "root {} is back", path.display());
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {
        $crate::logger::line($module, format_args!($($arg)*))
    };
}

/// `log!`, but only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::line($module, format_args!($($arg)*));
        }
    }};
}

/// Most detail lines shown under one status headline.
const MAX_DETAIL_LINES: usize = 12;

// ============================================================================
// Terminal state
// ============================================================================

/// What is drawn at the bottom of the screen right now.
#[derive(Debug, Default)]
struct Terminal {
    /// Height of the last status block, if nothing was printed after it
    status_lines: usize,
    /// Unterminated progress line to redraw under new output
    progress: Option<String>,
}

static TERMINAL: Mutex<Terminal> = Mutex::new(Terminal {
    status_lines: 0,
    progress: None,
});

impl Terminal {
    /// Print a finished line, keeping the progress line below it.
    fn println(&mut self, out: &mut impl Write, text: &str) -> io::Result<()> {
        if self.progress.is_some() {
            queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        writeln!(out, "{text}")?;
        if let Some(progress) = &self.progress {
            write!(out, "{progress}")?;
        }
        self.status_lines = 0;
        out.flush()
    }

    /// Replace the previous status block, if it is still the last output.
    fn show_status(&mut self, out: &mut impl Write, block: &str) -> io::Result<()> {
        if self.progress.is_some() {
            return self.println(out, block);
        }
        if self.status_lines > 0 {
            let up = u16::try_from(self.status_lines).unwrap_or(u16::MAX);
            queue!(
                out,
                cursor::MoveUp(up),
                cursor::MoveToColumn(0),
                Clear(ClearType::FromCursorDown)
            )?;
        }
        writeln!(out, "{block}")?;
        self.status_lines = block.lines().count();
        out.flush()
    }

    fn draw_progress(&mut self, out: &mut impl Write, text: String) -> io::Result<()> {
        queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        write!(out, "{text}")?;
        self.progress = Some(text);
        self.status_lines = 0;
        out.flush()
    }

    /// Erase the progress line, if one is drawn.
    fn take_progress(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.progress.take().is_some() {
            queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            out.flush()?;
        }
        Ok(())
    }
}

/// Run `f` against the shared terminal. Output errors are ignored.
fn with_terminal<F>(f: F)
where
    F: FnOnce(&mut Terminal, &mut io::StdoutLock<'static>) -> io::Result<()>,
{
    let mut terminal = TERMINAL.lock();
    let mut out = io::stdout().lock();
    let _ = f(&mut terminal, &mut out);
}

// ============================================================================
// Log lines
// ============================================================================

/// Backend of `log!` and `debug!`.
pub fn line(module: &str, message: fmt::Arguments<'_>) {
    let text = format!("{} {message}", prefix(module));
    with_terminal(|terminal, out| terminal.println(out, &text));
}

fn prefix(module: &str) -> String {
    let tag = format!("[{module}]");
    match module {
        "error" => tag.bright_red().bold().to_string(),
        "watch" | "run" => tag.bright_green().bold().to_string(),
        "process" | "tool" => tag.bright_magenta().bold().to_string(),
        "deps" | "discover" => tag.bright_cyan().bold().to_string(),
        _ => tag.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Status block
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Warning,
    Unchanged,
}

impl Status {
    fn symbol(self) -> String {
        match self {
            Self::Success => "✓".green().to_string(),
            Self::Failure => "✗".red().to_string(),
            Self::Warning => "⚠".yellow().to_string(),
            Self::Unchanged => "·".dimmed().to_string(),
        }
    }
}

/// Timestamped headline, then each non-blank detail line indented.
fn render_status(status: Status, headline: &str, detail: &str, clock: &str) -> String {
    let stamp = format!("[{clock}]");
    let mut block = format!("{} {} {headline}", stamp.dimmed(), status.symbol());

    let lines: Vec<&str> = detail.lines().filter(|l| !l.trim().is_empty()).collect();
    for line in lines.iter().take(MAX_DETAIL_LINES) {
        block.push_str("\n  ");
        block.push_str(line);
    }
    if lines.len() > MAX_DETAIL_LINES {
        let more = format!("... {} more lines", lines.len() - MAX_DETAIL_LINES);
        block.push_str(&format!("\n  {}", more.dimmed()));
    }
    block
}

fn show(status: Status, headline: &str, detail: &str) {
    let block = render_status(status, headline, detail, &clock());
    with_terminal(|terminal, out| terminal.show_status(out, &block));
}

pub fn status_success(message: &str) {
    show(Status::Success, message, "");
}

/// `detail` may hold one error per line; long lists are cut short.
pub fn status_error(summary: &str, detail: &str) {
    show(Status::Failure, summary, detail);
}

pub fn status_warning(message: &str) {
    show(Status::Warning, message, "");
}

pub fn status_unchanged(message: &str) {
    show(Status::Unchanged, &message.dimmed().to_string(), "");
}

/// Time of day (UTC) as `HH:MM:SS`.
fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
        % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

// ============================================================================
// Progress
// ============================================================================

/// Per-kind counters for a full build, updated in place on one line:
/// `[build] component 3/12  page 0/4`.
///
/// Dropping it without [`finish`](Self::finish) erases the line, so a
/// failed build leaves only its error on screen.
pub struct ProgressLine {
    counters: Vec<(&'static str, usize, AtomicUsize)>,
}

impl ProgressLine {
    /// Kinds with nothing to do are left out.
    pub fn new(totals: &[(&'static str, usize)]) -> Self {
        let progress = Self {
            counters: totals
                .iter()
                .filter(|(_, total)| *total > 0)
                .map(|&(name, total)| (name, total, AtomicUsize::new(0)))
                .collect(),
        };
        progress.redraw();
        progress
    }

    pub fn inc(&self, name: &str) {
        if let Some((_, _, done)) = self.counters.iter().find(|(n, ..)| *n == name) {
            done.fetch_add(1, Ordering::Relaxed);
            self.redraw();
        }
    }

    /// Keep the final counts on screen.
    pub fn finish(self) {
        if self.counters.is_empty() {
            return;
        }
        let text = self.text();
        with_terminal(|terminal, out| {
            terminal.take_progress(out)?;
            terminal.println(out, &text)
        });
    }

    fn text(&self) -> String {
        let counts: Vec<String> = self
            .counters
            .iter()
            .map(|(name, total, done)| format!("{name} {}/{total}", done.load(Ordering::Relaxed)))
            .collect();
        format!("{} {}", prefix("build"), counts.join("  "))
    }

    fn redraw(&self) {
        if self.counters.is_empty() {
            return;
        }
        let text = self.text();
        with_terminal(|terminal, out| terminal.draw_progress(out, text));
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        with_terminal(|terminal, out| terminal.take_progress(out));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::exec::strip_ansi;

    fn plain(bytes: &[u8]) -> String {
        strip_ansi(&String::from_utf8_lossy(bytes)).into_owned()
    }

    #[test]
    fn test_status_detail_is_indented_and_capped() {
        let detail: Vec<String> = (0..15).map(|i| format!("pages/p{i}.jml: bad")).collect();
        let block = render_status(Status::Failure, "build failed (15 errors)", &detail.join("\n"), "12:00:00");
        let block = strip_ansi(&block).into_owned();
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines[0], "[12:00:00] ✗ build failed (15 errors)");
        assert_eq!(lines[1], "  pages/p0.jml: bad");
        assert_eq!(lines.len(), 1 + MAX_DETAIL_LINES + 1);
        assert_eq!(lines.last(), Some(&"  ... 3 more lines"));
    }

    #[test]
    fn test_blank_detail_lines_dropped() {
        let block = render_status(Status::Success, "rebuilt", "\n  \n", "00:00:01");
        assert_eq!(strip_ansi(&block), "[00:00:01] ✓ rebuilt");
    }

    #[test]
    fn test_log_line_ends_status_overwrite() {
        let mut terminal = Terminal::default();
        let mut out = Vec::new();

        terminal.show_status(&mut out, "✗ failed\n  a\n  b").unwrap();
        assert_eq!(terminal.status_lines, 3);

        // A log line now sits below the block; the next status must not eat it
        terminal.println(&mut out, "[deps] warning").unwrap();
        assert_eq!(terminal.status_lines, 0);
        assert!(plain(&out).ends_with("[deps] warning\n"));
    }

    #[test]
    fn test_output_during_progress_redraws_it() {
        let mut terminal = Terminal::default();
        let mut out = Vec::new();

        terminal.draw_progress(&mut out, "[build] page 1/2".into()).unwrap();
        terminal.println(&mut out, "[deps] warning").unwrap();
        terminal.show_status(&mut out, "⚠ careful").unwrap();
        assert!(plain(&out).ends_with("⚠ careful\n[build] page 1/2"));
        assert_eq!(terminal.status_lines, 0);

        terminal.take_progress(&mut out).unwrap();
        assert!(terminal.progress.is_none());
    }

    #[test]
    fn test_progress_skips_empty_kinds() {
        let progress = ProgressLine::new(&[("component", 0), ("page", 2)]);
        progress.inc("page");
        progress.inc("component");
        assert_eq!(strip_ansi(&progress.text()), "[build] page 1/2");
        progress.finish();
    }

    #[test]
    fn test_clock_format() {
        let stamp = clock();
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.matches(':').count(), 2);
    }
}
