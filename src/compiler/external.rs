//! Compiler backed by an external executable.
//!
//! ```text
//! <command...> ast <path>                                  # JSON AST on stdout
//! <command...> compile <path> --kind <page|component> --out <dir>
//! ```
//!
//! A non-zero exit is a compile failure; its stderr becomes the diagnostics.

use std::path::{Path, PathBuf};
use std::process::Output;

use super::ast::{Ast, ImportCollector};
use super::{CompileError, Compiler, Document, ImportResolver};
use crate::config::ProjectConfig;
use crate::diagnostics::parse_compiler_output;
use crate::utils::exec::Cmd;

#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    command: Vec<String>,
    root: PathBuf,
    output: PathBuf,
    resolver: ImportResolver,
}

impl ExternalCompiler {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            command: config.compiler.command.clone(),
            root: config.root.clone(),
            output: config.build.output.clone(),
            resolver: ImportResolver::new(
                config.build.components.clone(),
                config.build.default_extension(),
            ),
        }
    }

    fn cmd(&self, subcommand: &str) -> Cmd {
        Cmd::from_slice(&self.command).arg(subcommand).cwd(&self.root)
    }

    /// Run to completion; a failed status becomes `CompileError::Failed`.
    fn run(&self, cmd: Cmd, path: &Path) -> Result<Output, CompileError> {
        let program = cmd.program_name();
        let output = cmd
            .output()
            .map_err(|source| CompileError::Launch { program, source })?;

        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CompileError::failed(
            path,
            parse_compiler_output(&stderr, path, &self.root),
        ))
    }

    fn compile(&self, doc: &Document) -> Result<(), CompileError> {
        let cmd = self
            .cmd("compile")
            .arg(&doc.path)
            .args(["--kind", doc.kind.label(), "--out"])
            .arg(&self.output);
        let output = self.run(cmd, &doc.path)?;

        // Successful compiles may still warn
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            for diagnostic in parse_compiler_output(&stderr, &doc.path, &self.root).iter() {
                crate::log!("warning"; "{}", diagnostic.message);
            }
        }
        Ok(())
    }
}

impl Compiler for ExternalCompiler {
    fn compile_page(&self, doc: &Document) -> Result<(), CompileError> {
        self.compile(doc)
    }

    fn compile_component(&self, doc: &Document) -> Result<(), CompileError> {
        self.compile(doc)
    }

    fn parse_imports(&self, path: &Path) -> Result<Vec<PathBuf>, CompileError> {
        let output = self.run(self.cmd("ast").arg(path), path)?;
        let json = String::from_utf8_lossy(&output.stdout);
        let ast = Ast::parse(&json).map_err(|e| CompileError::InvalidAst {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut imports = Vec::new();
        for source in ImportCollector::collect(&ast) {
            let id = self.resolver.resolve(path, &source);
            if !imports.contains(&id) {
                imports.push(id);
            }
        }
        Ok(imports)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use crate::core::DocumentKind;
    use std::fs;
    use tempfile::TempDir;

    /// `ast` prints `<path>.json`; `compile` fails when the source contains `FAIL`.
    const FAKE_COMPILER: &str = r#"
case "$1" in
  ast) cat "$2.json" ;;
  compile)
    if grep -q FAIL "$2"; then
      echo "$2:2: error: unknown element" >&2
      exit 1
    fi
    mkdir -p "$6" && touch "$6/$(basename "$2").html" ;;
esac
"#;

    fn setup() -> (TempDir, ExternalCompiler, PathBuf) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("jmlc.sh"), FAKE_COMPILER).unwrap();
        let mut config = test_config_at(dir.path(), "[compiler]\ncommand = [\"sh\", \"jmlc.sh\"]");
        config.finalize(dir.path());
        let root = config.root.clone();
        (dir, ExternalCompiler::new(&config), root)
    }

    #[test]
    fn test_parse_imports_resolves_specifiers() {
        let (_dir, compiler, root) = setup();
        let page = root.join("pages/home.jml");
        fs::write(root.join("components/layout.jml"), "").unwrap();
        fs::write(&page, "").unwrap();
        fs::write(
            root.join("pages/home.jml.json"),
            r#"{ "body": [
                { "kind": "import", "source": "layout" },
                { "kind": "import", "source": "./missing" }
            ] }"#,
        )
        .unwrap();

        let imports = compiler.parse_imports(&page).unwrap();
        assert_eq!(
            imports,
            vec![root.join("components/layout.jml"), root.join("pages/missing.jml")]
        );
    }

    #[test]
    fn test_invalid_ast() {
        let (_dir, compiler, root) = setup();
        let page = root.join("pages/bad.jml");
        fs::write(&page, "").unwrap();
        fs::write(root.join("pages/bad.jml.json"), "not json").unwrap();

        let err = compiler.parse_imports(&page).unwrap_err();
        assert!(matches!(err, CompileError::InvalidAst { .. }));
    }

    #[test]
    fn test_compile_success_and_failure() {
        let (_dir, compiler, root) = setup();
        let ok = root.join("pages/ok.jml");
        let bad = root.join("pages/bad.jml");
        fs::write(&ok, "<Page/>").unwrap();
        fs::write(&bad, "FAIL").unwrap();

        compiler
            .compile_document(&Document::new(&ok, DocumentKind::Page))
            .unwrap();
        assert!(root.join("build/ok.jml.html").exists());

        let err = compiler
            .compile_document(&Document::new(&bad, DocumentKind::Page))
            .unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.error_count(), 1);
        let first = diagnostics.first_error().unwrap();
        assert_eq!(first.path, bad);
        assert_eq!(first.line, Some(2));
    }

    #[test]
    fn test_launch_failure() {
        let dir = TempDir::new().unwrap();
        let mut config =
            test_config_at(dir.path(), "[compiler]\ncommand = [\"jmlc-not-installed-anywhere\"]");
        config.finalize(dir.path());
        let compiler = ExternalCompiler::new(&config);

        let err = compiler.parse_imports(&dir.path().join("pages/a.jml")).unwrap_err();
        assert!(matches!(err, CompileError::Launch { .. }));
    }
}
