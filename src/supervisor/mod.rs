//! External process supervision.
//!
//! Long-running tools (type-checkers, CSS generators) and one-shot
//! post-build tools are registered by name and driven through the
//! lifecycle in [`process`]:
//!
//! ```text
//! ProcessSupervisor
//! ├── register(spec)       → ManagedProcess (+ log handlers unless quiet)
//! ├── start / stop / restart
//! ├── run_to_completion    → one-shot tool run, restarts included
//! └── stop_all             → shutdown, every child reaped
//! ```

mod env;
mod output;
mod process;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::bus::EventBus;
use crate::utils::exec::EMPTY_FILTER;

pub use env::{css_spec, jml_vars, resolve_args, tool_spec, tool_specs};
pub use output::{LineHandler, log_handler};
pub use process::{
    Failure, ManagedProcess, ProcessSpec, ProcessStats, ProcessStatus, RestartPolicy,
};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process `{name}` is {status}")]
    InvalidState { name: String, status: ProcessStatus },

    #[error("no process named `{0}`")]
    Unknown(String),

    #[error("process `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("`{name}` failed to launch: {message}")]
    Launch { name: String, message: String },

    #[error("`{name}` {}", exit_message(.code))]
    Exit { name: String, code: Option<i32> },

    #[error("`{name}` failed after {restarts} restarts: {last}")]
    RestartsExhausted {
        name: String,
        restarts: u32,
        last: String,
    },
}

fn exit_message(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".into(),
    }
}

/// Registry of named processes.
#[derive(Default)]
pub struct ProcessSupervisor {
    processes: RwLock<BTreeMap<String, Arc<ManagedProcess>>>,
    bus: Option<Arc<EventBus>>,
}

impl ProcessSupervisor {
    pub fn new(bus: Option<Arc<EventBus>>) -> Self {
        Self {
            processes: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    /// Register a process; its output is logged under its name unless quiet.
    pub fn register(&self, spec: ProcessSpec) -> Result<Arc<ManagedProcess>, ProcessError> {
        let handler = (!spec.quiet).then(|| log_handler(spec.name.clone(), &EMPTY_FILTER));
        self.register_with(spec, handler.clone(), handler)
    }

    /// Register with explicit stdout/stderr handlers.
    pub fn register_with(
        &self,
        spec: ProcessSpec,
        on_output: Option<LineHandler>,
        on_error: Option<LineHandler>,
    ) -> Result<Arc<ManagedProcess>, ProcessError> {
        let mut processes = self.processes.write();
        if processes.contains_key(&spec.name) {
            return Err(ProcessError::AlreadyRegistered(spec.name));
        }

        let name = spec.name.clone();
        let process = Arc::new(ManagedProcess::with_handlers(
            spec,
            on_output,
            on_error,
            self.bus.clone(),
        ));
        processes.insert(name, Arc::clone(&process));
        Ok(process)
    }

    pub fn get(&self, name: &str) -> Result<Arc<ManagedProcess>, ProcessError> {
        self.processes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ProcessError::Unknown(name.to_string()))
    }

    pub fn start(&self, name: &str) -> Result<(), ProcessError> {
        let process = self.get(name)?;
        crate::debug!("process"; "starting `{}`", process.spec().command_line());
        process.start()
    }

    pub async fn stop(&self, name: &str) -> Result<(), ProcessError> {
        self.get(name)?.stop().await;
        Ok(())
    }

    /// Stop, clear any failure, and start again with a fresh restart budget.
    pub async fn restart(&self, name: &str) -> Result<(), ProcessError> {
        let process = self.get(name)?;
        process.stop().await;
        process.reset();
        process.start()
    }

    /// Run a registered process until it finishes on its own.
    ///
    /// Restarts from the process's policy happen inside this call; the
    /// error reports the final failure.
    pub async fn run_to_completion(&self, name: &str) -> Result<(), ProcessError> {
        self.restart(name).await?;
        let process = self.get(name)?;

        let status = process.wait().await;
        // Joins the finished loop
        process.stop().await;

        if status != ProcessStatus::Failed {
            return Ok(());
        }

        let restarts = process.stats().restart_count;
        let name = name.to_string();
        Err(match process.failure() {
            Some(failure) if restarts > 0 => ProcessError::RestartsExhausted {
                name,
                restarts,
                last: failure.to_string(),
            },
            Some(Failure::Launch(message)) => ProcessError::Launch { name, message },
            Some(Failure::Exit(code)) => ProcessError::Exit { name, code },
            Some(Failure::Wait(message)) => ProcessError::Launch { name, message },
            None => ProcessError::Exit { name, code: None },
        })
    }

    /// Stop every process. Returns once all children are reaped.
    pub async fn stop_all(&self) {
        let processes: Vec<_> = self.processes.read().values().cloned().collect();
        for process in processes {
            process.stop().await;
        }
    }

    pub fn stats(&self) -> Vec<ProcessStats> {
        self.processes
            .read()
            .values()
            .map(|p| p.stats())
            .collect()
    }
}
