// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline validation
//!
//! Collects every problem in a pipeline file at once, rather than stopping at
//! the first construction error the scheduler would report.

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::errors::ToolflowError;
use crate::pipeline::{DependencyGraph, Pipeline, StepDefinition};
use crate::tools::ToolRegistry;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        // Check for empty steps
        if pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        // Check for duplicate step names
        let mut seen_names = HashSet::new();
        let mut has_duplicates = false;
        for step in &pipeline.steps {
            if !seen_names.insert(&step.name) {
                has_duplicates = true;
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }
        }

        // Validate DAG structure (cycles and unknown dependencies)
        if !has_duplicates {
            match DependencyGraph::build(&pipeline.steps) {
                Ok(_) => {}
                Err(ToolflowError::CyclicDependency { steps }) => {
                    result.add_error(&format!("Circular dependency: {}", steps.join(" -> ")));
                }
                Err(e) => result.add_error(&e.to_string()),
            }
        }

        for step in &pipeline.steps {
            Self::validate_step(step, &mut result);
        }

        if pipeline.options.concurrency == 0 {
            result.add_warning("options.concurrency is 0; steps will run one at a time");
        }

        if pipeline.cache.enabled && pipeline.cache.capacity == 0 {
            result.add_warning("cache.capacity is 0; the cache will hold a single entry");
        }

        if pipeline.cache.enabled && pipeline.cache.ttl_secs == 0 {
            result.add_warning("cache.ttl_secs is 0; cached results expire immediately");
        }

        result
    }

    /// Validate and also check that every tool is registered
    pub fn validate_with_registry(pipeline: &Pipeline, registry: &ToolRegistry) -> ValidationResult {
        let mut result = Self::validate(pipeline);

        for step in &pipeline.steps {
            if !step.tool.is_empty() && !registry.contains(&step.tool) {
                result.add_error(&format!(
                    "Step '{}': tool '{}' is not registered (available: {})",
                    step.name,
                    step.tool,
                    registry.names().join(", ")
                ));
            }
        }

        result
    }

    /// Validate a single step
    fn validate_step(step: &StepDefinition, result: &mut ValidationResult) {
        if step.name.trim().is_empty() {
            result.add_error("A step has an empty name");
        }

        if step.tool.trim().is_empty() {
            result.add_error(&format!("Step '{}': tool is empty", step.name));
        }

        if step.action.trim().is_empty() {
            result.add_error(&format!("Step '{}': action is empty", step.name));
        }

        let mut deps = HashSet::new();
        for dep in &step.depends_on {
            if !deps.insert(dep) {
                result.add_warning(&format!(
                    "Step '{}': dependency '{}' is listed more than once",
                    step.name, dep
                ));
            }
        }

        if step.tool == "shell" {
            let has_command = step
                .params
                .get("command")
                .and_then(Value::as_str)
                .is_some_and(|c| !c.trim().is_empty());

            if !has_command {
                result.add_error(&format!("Step '{}': shell command is empty", step.name));
            }
        }
    }

    /// Check that subject files exist (runtime validation)
    pub fn validate_files(pipeline: &Pipeline, base_path: &Path) -> Vec<String> {
        let mut missing = Vec::new();

        for step in &pipeline.steps {
            let file = step
                .subject
                .as_deref()
                .or_else(|| step.params.get("file").and_then(Value::as_str));

            if let Some(file) = file {
                if !base_path.join(file).exists() {
                    missing.push(format!("Step '{}': subject file not found: {}", step.name, file));
                }
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
