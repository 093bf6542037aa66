// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Workflow command - print or execute a ready-made workflow

use miette::Result;

use super::run::{execute, report, RunOverrides};
use crate::pipeline::Pipeline;
use crate::workflows::{expand_files, WorkflowFactory, WorkflowKind};

/// Run the workflow command
pub async fn run(
    name: String,
    patterns: Vec<String>,
    command: Option<String>,
    execute_now: bool,
    concurrency: usize,
    verbose: bool,
) -> Result<()> {
    let kind: WorkflowKind = name.parse()?;
    let root = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let files = expand_files(&patterns, &root)?;
    if files.is_empty() {
        return Err(miette::miette!("No files matched: {}", patterns.join(" ")));
    }

    let factory = match &command {
        Some(template) => WorkflowFactory::shell(template),
        None => WorkflowFactory::default(),
    };

    let mut pipeline = Pipeline::new(&kind.to_string(), factory.build(kind, &files, &root));
    pipeline.options.concurrency = concurrency;

    if !execute_now {
        print!("{}", pipeline.to_yaml()?);
        return Ok(());
    }

    tracing::info!(workflow = %kind, files = files.len(), "Running workflow");

    let overrides = RunOverrides::default();
    let result = execute(&pipeline, &root, &overrides, verbose).await?;
    report(&result, verbose)
}
