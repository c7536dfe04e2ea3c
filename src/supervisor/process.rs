//! One supervised external process.
//!
//! ```text
//! Stopped ─start─► Starting ─spawned─► Running ─exit ok──────────► Stopped
//!                     ▲                   │  └─stop─► Stopping ──► Stopped
//!                     │                   └─exit err─┬─► Restarting ─┘ (budget left)
//!                     └───────── delay ──────────────┘
//!                                                    └─► Failed (budget spent)
//! ```
//!
//! The lifecycle runs in one spawned task. Cancellation is a token shared
//! with that task; the child is killed on cancel and on drop, so stopping
//! the supervisor always reaps its processes.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ProcessError;
use super::output::{LineHandler, forward_lines};
use crate::bus::{Event, EventBus, EventType};

/// How long output may keep flowing after the child has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Stopped,
    Starting,
    Running,
    Restarting,
    Stopping,
    Failed,
}

impl ProcessStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }

    /// The run loop is alive in this state.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Restarting)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub delay: Duration,
    pub max_restarts: u32,
}

impl RestartPolicy {
    pub const NEVER: Self = Self {
        enabled: false,
        delay: Duration::ZERO,
        max_restarts: 0,
    };
}

/// Everything needed to launch a process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Logical name, the registry key
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub restart: RestartPolicy,
    /// Discard output instead of logging it
    pub quiet: bool,
}

impl ProcessSpec {
    /// Spec from a command line (`["tsc", "--noEmit"]`), no restarts.
    pub fn from_command(name: impl Into<String>, command: &[String], cwd: impl Into<PathBuf>) -> Self {
        let (program, args) = command.split_first().map_or_else(
            || (String::new(), Vec::new()),
            |(program, args)| (program.clone(), args.to_vec()),
        );
        Self {
            name: name.into(),
            command: program,
            args,
            cwd: cwd.into(),
            env: Vec::new(),
            restart: RestartPolicy::NEVER,
            quiet: false,
        }
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// `tsc --noEmit` for log lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Why the last run ended badly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Launch(String),
    Exit(Option<i32>),
    Wait(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch(e) => write!(f, "failed to launch: {e}"),
            Self::Exit(Some(code)) => write!(f, "exited with code {code}"),
            Self::Exit(None) => f.write_str("terminated by signal"),
            Self::Wait(e) => write!(f, "wait failed: {e}"),
        }
    }
}

/// Point-in-time view of a managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    pub name: String,
    pub status: ProcessStatus,
    pub pid: Option<u32>,
    pub started_at: Option<SystemTime>,
    pub uptime: Option<Duration>,
    pub restart_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct State {
    status: ProcessStatus,
    pid: Option<u32>,
    started_at: Option<SystemTime>,
    started: Option<Instant>,
    restart_count: u32,
    failure: Option<Failure>,
}

impl State {
    const fn new() -> Self {
        Self {
            status: ProcessStatus::Stopped,
            pid: None,
            started_at: None,
            started: None,
            restart_count: 0,
            failure: None,
        }
    }
}

/// Live run loop handles.
struct RunHandle {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

/// Shared between the handle and its run loop.
struct Shared {
    spec: ProcessSpec,
    state: Mutex<State>,
    on_output: Option<LineHandler>,
    on_error: Option<LineHandler>,
    bus: Option<Arc<EventBus>>,
}

impl Shared {
    fn set_status(&self, status: ProcessStatus) {
        self.state.lock().status = status;
    }

    fn publish(&self, kind: EventType, detail: Option<String>) {
        if let Some(bus) = &self.bus {
            let mut event = Event::new(kind, "supervisor").with("name", self.spec.name.clone());
            if let Some(detail) = detail {
                event = event.with("detail", detail);
            }
            bus.publish(event);
        }
    }
}

pub struct ManagedProcess {
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

impl ManagedProcess {
    pub fn new(spec: ProcessSpec) -> Self {
        Self::with_handlers(spec, None, None, None)
    }

    pub fn with_handlers(
        spec: ProcessSpec,
        on_output: Option<LineHandler>,
        on_error: Option<LineHandler>,
        bus: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                spec,
                state: Mutex::new(State::new()),
                on_output,
                on_error,
                bus,
            }),
            run: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.shared.spec
    }

    /// Launch the run loop. Rejected unless currently `Stopped`.
    pub fn start(&self) -> Result<(), ProcessError> {
        {
            let mut state = self.shared.state.lock();
            if state.status != ProcessStatus::Stopped {
                return Err(ProcessError::InvalidState {
                    name: self.name().to_string(),
                    status: state.status,
                });
            }
            state.status = ProcessStatus::Starting;
            state.restart_count = 0;
            state.failure = None;
        }

        let cancel = CancellationToken::new();
        let (done_tx, done) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            cancel.clone(),
            done_tx,
        ));

        // A finished previous loop is simply replaced
        *self.run.lock() = Some(RunHandle { cancel, done, task });
        Ok(())
    }

    /// Cancel the run loop, kill the child, and wait for the loop to end.
    ///
    /// No-op when nothing is running. A `Failed` process stays `Failed`.
    pub async fn stop(&self) {
        let Some(handle) = self.run.lock().take() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            if state.status.is_active() {
                state.status = ProcessStatus::Stopping;
            }
        }
        handle.cancel.cancel();

        let mut done = handle.done;
        let _ = done.wait_for(|finished| *finished).await;
        if let Err(e) = handle.task.await
            && e.is_panic()
        {
            crate::log!("process"; "`{}` run loop panicked", self.name());
            self.shared.set_status(ProcessStatus::Failed);
        }
    }

    /// Wait until the current run loop ends on its own, then report status.
    pub async fn wait(&self) -> ProcessStatus {
        let done = self.run.lock().as_ref().map(|h| h.done.clone());
        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.status()
    }

    /// Clear a `Failed` state so the process can be started again.
    pub fn reset(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.status == ProcessStatus::Failed {
            state.status = ProcessStatus::Stopped;
            true
        } else {
            false
        }
    }

    pub fn status(&self) -> ProcessStatus {
        self.shared.state.lock().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProcessStatus::Running
    }

    pub fn failure(&self) -> Option<Failure> {
        self.shared.state.lock().failure.clone()
    }

    pub fn stats(&self) -> ProcessStats {
        let state = self.shared.state.lock();
        let running = state.status == ProcessStatus::Running;
        ProcessStats {
            name: self.name().to_string(),
            status: state.status,
            pid: state.pid,
            started_at: state.started_at,
            uptime: state.started.filter(|_| running).map(|t| t.elapsed()),
            restart_count: state.restart_count,
            last_error: state.failure.as_ref().map(ToString::to_string),
        }
    }
}

// ============================================================================
// Run loop
// ============================================================================

enum Outcome {
    Success,
    Error(Failure),
    Cancelled,
}

async fn run_loop(shared: Arc<Shared>, cancel: CancellationToken, done: watch::Sender<bool>) {
    let name = shared.spec.name.clone();

    loop {
        if cancel.is_cancelled() {
            shared.set_status(ProcessStatus::Stopped);
            break;
        }

        match run_once(&shared, &cancel).await {
            Outcome::Cancelled => {
                shared.set_status(ProcessStatus::Stopped);
                shared.publish(EventType::ProcessExited, Some("stopped".into()));
                break;
            }
            Outcome::Success => {
                shared.set_status(ProcessStatus::Stopped);
                shared.publish(EventType::ProcessExited, None);
                break;
            }
            Outcome::Error(failure) => {
                let policy = shared.spec.restart;
                let message = failure.to_string();

                // Count and transition under the same lock readers use
                let restart = {
                    let mut state = shared.state.lock();
                    state.pid = None;
                    state.failure = Some(failure);
                    if policy.enabled && state.restart_count < policy.max_restarts {
                        state.restart_count += 1;
                        state.status = ProcessStatus::Restarting;
                        Some(state.restart_count)
                    } else {
                        state.status = ProcessStatus::Failed;
                        None
                    }
                };

                let Some(attempt) = restart else {
                    crate::log!("process"; "`{}` failed: {}", name, message);
                    shared.publish(EventType::ProcessFailed, Some(message));
                    break;
                };

                crate::debug!(
                    "process"; "`{}` {}, restarting ({}/{})",
                    name, message, attempt, policy.max_restarts
                );
                shared.publish(EventType::ProcessRestarting, Some(message));

                tokio::select! {
                    _ = cancel.cancelled() => {
                        shared.set_status(ProcessStatus::Stopped);
                        break;
                    }
                    _ = tokio::time::sleep(policy.delay) => {
                        shared.set_status(ProcessStatus::Starting);
                    }
                }
            }
        }
    }

    let _ = done.send(true);
}

/// Launch the child once and wait for it to exit or be cancelled.
async fn run_once(shared: &Shared, cancel: &CancellationToken) -> Outcome {
    let spec = &shared.spec;

    let mut command = Command::new(&spec.command);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return Outcome::Error(Failure::Launch(format!("`{}`: {e}", spec.command))),
    };

    {
        let mut state = shared.state.lock();
        state.status = ProcessStatus::Running;
        state.pid = child.id();
        state.started_at = Some(SystemTime::now());
        state.started = Some(Instant::now());
    }
    shared.publish(EventType::ProcessStarted, None);

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, shared.on_output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, shared.on_error.clone()));
    }

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    let outcome = match exited {
        None => {
            if let Err(e) = child.kill().await {
                crate::debug!("process"; "`{}` kill failed: {}", spec.name, e);
            }
            Outcome::Cancelled
        }
        Some(Ok(status)) if status.success() => Outcome::Success,
        Some(Ok(status)) => Outcome::Error(Failure::Exit(status.code())),
        Some(Err(e)) => Outcome::Error(Failure::Wait(e.to_string())),
    };

    if matches!(outcome, Outcome::Cancelled) {
        readers.iter().for_each(JoinHandle::abort);
        return outcome;
    }

    // Grandchildren may inherit the pipes and keep them open long after
    // the child itself is gone
    let drain = async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    };
    let cancelled = tokio::select! {
        _ = drain => false,
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
            crate::debug!("process"; "`{}` output still open after exit, detaching", spec.name);
            false
        }
    };
    readers.iter().for_each(JoinHandle::abort);

    if cancelled { Outcome::Cancelled } else { outcome }
}
