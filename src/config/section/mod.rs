//! `jml.toml` section definitions.

mod build;
mod compiler;
mod runtime;
mod tools;
mod watch;

pub use build::BuildConfig;
pub use compiler::CompilerConfig;
pub use runtime::{BusConfig, DiagnosticsConfig};
pub use tools::{CssFormat, CssToolConfig, RestartConfig, ToolConfig, ToolsConfig};
pub use watch::WatchConfig;

use super::{ConfigDiagnostics, FieldPath};

/// Package runners download on demand, so a missing one is only a hint.
const PACKAGE_RUNNERS: &[&str] = &["npx", "bunx", "pnpx", "yarn", "dlx"];

/// Check that `command[0]` is an installed executable.
pub(crate) fn check_command(field: FieldPath, command: &[String], diag: &mut ConfigDiagnostics) {
    let Some(cmd) = command.first() else {
        diag.error(field, format!("{field} is empty"));
        return;
    };

    if which::which(cmd).is_ok() {
        return;
    }

    if PACKAGE_RUNNERS.contains(&cmd.as_str()) {
        if let Some(package) = command.get(1) {
            diag.hint(
                field,
                format!("`{package}` via `{cmd}`, ensure the package is installed"),
            );
        }
    } else {
        diag.error_with_hint(
            field,
            format!("`{cmd}` not found"),
            format!("install the command or update {field}"),
        );
    }
}
