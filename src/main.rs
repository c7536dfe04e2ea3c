//! jml - an incremental build engine for component-based document projects.

#![allow(dead_code)]

mod bus;
mod cli;
mod compiler;
mod config;
mod core;
mod diagnostics;
mod graph;
mod logger;
mod orchestrator;
mod reload;
mod supervisor;
mod utils;
mod watcher;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(ProjectConfig::load(&cli)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        match cli.command {
            Commands::Build => cli::build::build_project(config).await,
            Commands::Run { .. } => cli::run::run_project(config).await,
        }
    })
}
