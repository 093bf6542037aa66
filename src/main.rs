// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! toolflow - concurrent tool pipeline runner
//!
//! Run dependency-ordered tool steps with a content-addressed result cache.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so command output stays clean
    let default_filter = if cli.verbose { "toolflow=debug" } else { "toolflow=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if !toolflow::utils::should_use_colors() {
        colored::control::set_override(false);
    }

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            pipeline,
            concurrency,
            timeout,
            no_cache,
        } => toolflow::cli::run::run(pipeline, concurrency, timeout, no_cache, cli.verbose).await,
        Commands::Validate { pipeline } => {
            toolflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            toolflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Workflow {
            name,
            files,
            command,
            run,
            concurrency,
        } => {
            toolflow::cli::workflow::run(name, files, command, run, concurrency, cli.verbose).await
        }
    }
}
