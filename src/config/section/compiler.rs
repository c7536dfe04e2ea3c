//! `[compiler]` section: the external document compiler.

use serde::Deserialize;

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Executable and leading arguments, e.g. `["npx", "jmlc"]`
    pub command: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: vec!["jmlc".into()],
        }
    }
}

impl CompilerConfig {
    const COMMAND: FieldPath = FieldPath::new("compiler.command");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        super::check_command(Self::COMMAND, &self.command, diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_default_command() {
        let config = test_parse_config("");
        assert_eq!(config.compiler.command, vec!["jmlc"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = test_parse_config("[compiler]\ncommand = []");
        let mut diag = ConfigDiagnostics::new();
        config.compiler.validate(&mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_missing_executable_rejected() {
        let config = test_parse_config("[compiler]\ncommand = [\"jmlc-definitely-not-installed\"]");
        let mut diag = ConfigDiagnostics::new();
        config.compiler.validate(&mut diag);
        assert!(diag.has_errors());
    }
}
