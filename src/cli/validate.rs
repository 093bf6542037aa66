// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{Pipeline, PipelineValidator};
use crate::tools::create_default_registry;
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    // Load pipeline
    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            print_error("Failed to parse pipeline");
            println!();
            return Err(e.into());
        }
    };

    print_success("Pipeline file parsed");

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    // Validate pipeline structure and tool names
    let registry = create_default_registry(cwd.clone());
    let validation = PipelineValidator::validate_with_registry(&pipeline, &registry);

    // Check for file existence
    let missing_files = PipelineValidator::validate_files(&pipeline, &cwd);

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !missing_files.is_empty() {
        print_section(&"Missing files".yellow().to_string());
        for missing in &missing_files {
            print_warning(missing);
        }
    }

    if validation.has_warnings() {
        print_section(&"Warnings".yellow().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        println!("  Name: {}", pipeline.name);
        println!("  Steps: {}", pipeline.steps.len());
        for step in &pipeline.steps {
            let deps = if step.depends_on.is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", step.depends_on.join(", "))
            };
            println!(
                "    - {} ({}.{}){}",
                step.name,
                step.tool,
                step.action,
                deps.dimmed()
            );
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() || !missing_files.is_empty() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}
