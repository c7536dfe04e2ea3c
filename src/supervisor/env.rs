//! Tool environment and process specs built from `[tools]`.
//!
//! Every tool sees `$JML_ROOT`, `$JML_OUTPUT_DIR` and `$JML_MODE`, both as
//! environment variables and substituted into its arguments.

use std::path::Path;

use rustc_hash::FxHashMap;

use super::process::{ProcessSpec, RestartPolicy};
use crate::config::{CssFormat, CssToolConfig, ProjectConfig, RestartConfig, ToolConfig};
use crate::core::BuildMode;

/// Build `$JML_*` variables for tool execution.
pub fn jml_vars(config: &ProjectConfig, mode: BuildMode) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert("JML_ROOT".into(), config.root().display().to_string());
    vars.insert(
        "JML_OUTPUT_DIR".into(),
        config.output_dir().display().to_string(),
    );
    vars.insert("JML_MODE".into(), mode.as_str().into());
    vars
}

/// Replace `$JML_XXX` occurrences with their values.
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    // Longest names first so `$JML_ROOT` never clips a longer variable
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for key in &keys {
                result = result.replace(&format!("${key}"), &vars[*key]);
            }
            result
        })
        .collect()
}

impl From<RestartConfig> for RestartPolicy {
    fn from(config: RestartConfig) -> Self {
        Self {
            enabled: config.enable,
            delay: config.delay(),
            max_restarts: config.max,
        }
    }
}

/// Process spec for a generic tool.
pub fn tool_spec(
    name: &str,
    tool: &ToolConfig,
    config: &ProjectConfig,
    mode: BuildMode,
) -> ProcessSpec {
    let vars = jml_vars(config, mode);
    let command = resolve_args(&tool.command, &vars);
    ProcessSpec::from_command(name, &command, config.root())
        .with_env(vars)
        .with_restart(tool.restart.into())
        .quiet(tool.quiet)
}

/// Process spec for the CSS generator, expanded from its preset.
pub fn css_spec(css: &CssToolConfig, config: &ProjectConfig, mode: BuildMode) -> ProcessSpec {
    let vars = jml_vars(config, mode);
    let output = config.output_dir().join(&css.output);

    let mut command = resolve_args(&css.command, &vars);
    match css.resolved_format() {
        CssFormat::Uno => {
            command.extend(resolve_args(&css.scan, &vars));
            command.extend(["-o".into(), display(&output)]);
        }
        CssFormat::Tailwind | CssFormat::Auto => {
            if let Some(input) = &css.path {
                command.extend(["-i".into(), display(input)]);
            }
            command.extend(["-o".into(), display(&output)]);
        }
    }
    if css.minify && mode == BuildMode::Build {
        command.push("--minify".into());
    }

    ProcessSpec::from_command("css", &command, config.root())
        .with_env(vars)
        .with_restart(css.restart.into())
        .quiet(css.quiet)
}

/// All active tools in run order: type-check, CSS, then `[[tools.post]]`.
pub fn tool_specs(config: &ProjectConfig, mode: BuildMode) -> Vec<ProcessSpec> {
    let tools = &config.tools;
    let mut specs = Vec::new();

    if tools.typecheck.is_active() {
        specs.push(tool_spec("typecheck", &tools.typecheck, config, mode));
    }
    if tools.css.enable {
        specs.push(css_spec(&tools.css, config, mode));
    }
    for tool in tools.post.iter().filter(|t| t.is_active()) {
        let name = unique_name(tool.display_name(), &specs);
        specs.push(tool_spec(&name, tool, config, mode));
    }
    specs
}

/// `sh`, `sh-2`, `sh-3`: registry keys must not collide.
fn unique_name(base: &str, specs: &[ProcessSpec]) -> String {
    let taken = |name: &str| specs.iter().any(|s| s.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{base}-{i}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
