// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResultCache;
use crate::errors::ToolflowError;
use crate::pipeline::{
    Pipeline, PipelineResult, PipelineScheduler, PipelineValidator, RunOptions, StepContext,
    StepExecutor,
};
use crate::tools::create_default_registry;
use crate::utils::{create_progress_bar, create_spinner, follow_events, format_outcome};

/// Command-line overrides for the options in a pipeline file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub no_cache: bool,
}

impl RunOverrides {
    fn apply(&self, pipeline: &Pipeline) -> RunOptions {
        let mut options = pipeline.options.run_options();
        if let Some(concurrency) = self.concurrency {
            options.concurrency_limit = concurrency;
        }
        if let Some(secs) = self.timeout_secs {
            options.timeout = Some(Duration::from_secs(secs));
        }
        options
    }
}

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    no_cache: bool,
    verbose: bool,
) -> Result<()> {
    let pipeline = Pipeline::from_file(&pipeline_path)?;

    let overrides = RunOverrides {
        concurrency,
        timeout_secs: timeout,
        no_cache,
    };

    let root = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let result = execute(&pipeline, &root, &overrides, verbose).await?;
    report(&result, verbose)
}

/// Validate, then schedule every step of `pipeline` with progress output
pub async fn execute(
    pipeline: &Pipeline,
    root: &Path,
    overrides: &RunOverrides,
    verbose: bool,
) -> Result<PipelineResult> {
    let registry = create_default_registry(root.to_path_buf());

    // Validate pipeline
    let validation = PipelineValidator::validate_with_registry(pipeline, &registry);

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(ToolflowError::InvalidPipeline {
            reason: format!("{} problem(s) in '{}'", validation.errors.len(), pipeline.name),
            help: Some("Run 'toolflow validate' for details".to_string()),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    // Check required tools are available
    let spinner = create_spinner("Checking tools...");
    let missing_tools = registry.check_tools(&pipeline.steps).await;
    spinner.finish_and_clear();

    if !missing_tools.is_empty() {
        eprintln!("{}", "Missing required tools:".red().bold());
        for tool in &missing_tools {
            eprintln!("  {} {}", "✗".red(), tool);
        }
        return Err(miette::miette!("Required tools are not available"));
    }

    let mut executor = StepExecutor::new(Arc::new(registry))
        .with_hasher(pipeline.cache.strategy.hasher());

    if !overrides.no_cache && pipeline.cache.enabled {
        executor = executor.with_cache(Arc::new(ResultCache::from_config(&pipeline.cache)));
    }

    let options = overrides.apply(pipeline);
    let mut scheduler = PipelineScheduler::new(executor, StepContext::new(root));

    // Drive the progress bar from the run's events
    let progress = create_progress_bar(pipeline.steps.len() as u64, &pipeline.name);
    let tracker = tokio::spawn(follow_events(progress.clone(), scheduler.subscribe()));

    let result = scheduler.run(pipeline.steps.clone(), &options).await;

    // The scheduler owns the sender; dropping it ends the tracker loop
    drop(scheduler);
    let _ = tracker.await;
    progress.finish_and_clear();

    Ok(result?)
}

/// Print step outcomes and turn a failed run into an error
pub fn report(result: &PipelineResult, verbose: bool) -> Result<()> {
    for outcome in &result.steps {
        println!("{}", format_outcome(outcome));
    }

    println!();
    let summary = format!(
        "{} succeeded ({} cached), {} failed, {} skipped in {:.2}s",
        result.succeeded().count(),
        result.cache_hits(),
        result.failed().count(),
        result.skipped().count(),
        result.total_duration.as_secs_f64()
    );

    if verbose {
        for outcome in result.succeeded() {
            if let Some(data) = &outcome.data {
                println!("{} {}", outcome.name.bold(), data.to_string().dimmed());
            }
        }
        println!();
    }

    if result.success {
        println!("{}", summary.green().bold());
        Ok(())
    } else {
        println!("{}", summary.red().bold());
        Err(miette::miette!("Pipeline execution failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepDefinition;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_take_precedence() {
        let mut pipeline = Pipeline::new("p", vec![]);
        pipeline.options.concurrency = 8;
        pipeline.options.timeout_secs = Some(60);

        let options = RunOverrides::default().apply(&pipeline);
        assert_eq!(options.concurrency_limit, 8);
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));

        let options = RunOverrides {
            concurrency: Some(1),
            timeout_secs: Some(5),
            no_cache: false,
        }
        .apply(&pipeline);
        assert_eq!(options.concurrency_limit, 1);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_execute_shell_pipeline() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            "shell",
            vec![
                StepDefinition::new("hello", "shell", "run")
                    .with_params(json!({ "command": "echo hello" })),
                StepDefinition::new("fail", "shell", "run")
                    .with_params(json!({ "command": "exit 3" }))
                    .depends_on(["hello"]),
                StepDefinition::new("after", "shell", "run")
                    .with_params(json!({ "command": "true" }))
                    .depends_on(["fail"]),
            ],
        );

        let result = execute(&pipeline, dir.path(), &RunOverrides::default(), false)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.step("hello").unwrap().success);
        assert!(result.step("fail").unwrap().is_failure());
        assert!(result.step("after").unwrap().skipped);
        assert!(report(&result, false).is_err());
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_pipeline() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new("bad", vec![StepDefinition::new("x", "nope", "run")]);

        assert!(execute(&pipeline, dir.path(), &RunOverrides::default(), false)
            .await
            .is_err());
    }
}
