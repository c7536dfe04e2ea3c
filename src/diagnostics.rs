//! Compile diagnostics (errors and warnings) accumulated during a pass.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::utils::exec::strip_ansi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single compile diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: Option<u32>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, message)
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        match self.severity {
            Severity::Error => write!(f, ": {}", self.message),
            Severity::Warning => write!(f, ": warning: {}", self.message),
        }
    }
}

/// Collection of diagnostics for one compile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn push_error(&mut self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.push(Diagnostic::error(path, message));
    }

    pub fn push_warning(&mut self, path: impl Into<PathBuf>, message: impl Into<String>) {
        self.push(Diagnostic::warning(path, message));
    }

    /// Append everything from `other`.
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Drop every diagnostic for `path`. Returns whether any were removed.
    pub fn clear_for(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|d| d.path != path);
        self.entries.len() < before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.is_error())
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.errors().next()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Compiler output parsing
// ============================================================================

/// `path:line[:col]: [error|warning:] message`
static LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>[^: \t][^:]*):(?P<line>[0-9]+)(?::[0-9]+)?:[ \t]*(?:(?P<sev>error|warning):[ \t]*)?(?P<msg>.+)$")
        .expect("static regex")
});

/// Parse compiler stderr into diagnostics.
///
/// Located lines become individual diagnostics; relative paths are joined
/// onto `root`. Unlocated lines are attached to the preceding diagnostic.
/// If nothing is located, the whole output is a single error on `fallback`.
pub fn parse_compiler_output(output: &str, fallback: &Path, root: &Path) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let mut loose = Vec::new();

    for raw in output.lines() {
        let line = strip_ansi(raw);
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = LOCATED.captures(line) {
            let path = PathBuf::from(&caps["path"]);
            let path = if path.is_absolute() { path } else { root.join(path) };
            let severity = match caps.name("sev").map(|m| m.as_str()) {
                Some("warning") => Severity::Warning,
                _ => Severity::Error,
            };
            diagnostics.push(Diagnostic {
                path,
                line: caps["line"].parse().ok(),
                severity,
                message: caps["msg"].trim().to_string(),
            });
        } else if let Some(last) = diagnostics.entries.last_mut() {
            last.message.push('\n');
            last.message.push_str(line);
        } else {
            loose.push(line.to_string());
        }
    }

    if diagnostics.is_empty() {
        let message = if loose.is_empty() {
            "compiler failed without output".to_string()
        } else {
            loose.join("\n")
        };
        diagnostics.push_error(fallback, message);
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_counts() {
        let mut diags = Diagnostics::new();
        diags.push_warning("/a.jml", "unused import");
        assert!(!diags.has_errors());

        diags.push_error("/b.jml", "unexpected token");
        diags.push_error("/a.jml", "unknown element");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.first_error().unwrap().path, PathBuf::from("/b.jml"));
    }

    #[test]
    fn test_clear_for_path() {
        let mut diags = Diagnostics::new();
        diags.push_error("/a.jml", "x");
        diags.push_warning("/a.jml", "y");
        diags.push_error("/b.jml", "z");

        assert!(diags.clear_for(Path::new("/a.jml")));
        assert!(!diags.clear_for(Path::new("/a.jml")));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_display() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("/a.jml", "bad").at_line(3));
        diags.push_warning("/b.jml", "meh");
        assert_eq!(diags.to_string(), "/a.jml:3: bad\n/b.jml: warning: meh");
    }

    #[test]
    fn test_parse_located_lines() {
        let stderr = "pages/home.jml:4:2: error: unknown element `Hedaer`\n  did you mean `Header`?\ncomponents/x.jml:1: warning: unused prop\n";
        let diags = parse_compiler_output(stderr, Path::new("/site/pages/home.jml"), Path::new("/site"));

        assert_eq!(diags.len(), 2);
        let first = diags.iter().next().unwrap();
        assert_eq!(first.path, PathBuf::from("/site/pages/home.jml"));
        assert_eq!(first.line, Some(4));
        assert_eq!(first.message, "unknown element `Hedaer`\n  did you mean `Header`?");
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn test_parse_unlocated_output() {
        let diags = parse_compiler_output(
            "\x1b[31mpanic: out of memory\x1b[0m\n",
            Path::new("/site/pages/a.jml"),
            Path::new("/site"),
        );
        assert_eq!(diags.len(), 1);
        let only = diags.first_error().unwrap();
        assert_eq!(only.path, PathBuf::from("/site/pages/a.jml"));
        assert_eq!(only.message, "panic: out of memory");
    }

    #[test]
    fn test_parse_empty_output() {
        let diags = parse_compiler_output("", Path::new("/a.jml"), Path::new("/"));
        assert_eq!(diags.error_count(), 1);
    }
}
