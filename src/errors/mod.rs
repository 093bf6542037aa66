// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Error types
//!
//! Construction errors are returned before a run starts. Tool failures never
//! surface here during a run; they are recorded on the step's outcome instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for toolflow operations
pub type ToolflowResult<T> = Result<T, ToolflowError>;

/// Main error type for toolflow
#[derive(Error, Debug, Diagnostic)]
pub enum ToolflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Graph construction errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Circular dependency detected: {}", steps.join(" -> "))]
    #[diagnostic(
        code(toolflow::cyclic_dependency),
        help("Review the depends_on lists of these steps to remove the cycle")
    )]
    CyclicDependency { steps: Vec<String> },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(toolflow::unknown_dependency),
        help("Check that '{dependency}' is defined in the same pipeline")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Duplicate step name: '{step}'")]
    #[diagnostic(
        code(toolflow::duplicate_step_name),
        help("Step names must be unique within a pipeline")
    )]
    DuplicateStepName { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Tool errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' is not registered")]
    #[diagnostic(code(toolflow::tool_not_found), help("Registered tools: {available}"))]
    ToolNotFound { tool: String, available: String },

    #[error("Tool '{tool}' failed: {message}")]
    #[diagnostic(code(toolflow::tool_invocation_failed))]
    ToolInvocation { tool: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline file errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(toolflow::pipeline_not_found),
        help("Create .toolflow.yaml or generate one with 'toolflow workflow pre-commit <files>'")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(toolflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Unknown workflow '{name}'")]
    #[diagnostic(
        code(toolflow::unknown_workflow),
        help("Available workflows: pre-commit, pre-merge")
    )]
    UnknownWorkflow { name: String },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(toolflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(toolflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(toolflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(toolflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(toolflow::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(toolflow::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for ToolflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for ToolflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for ToolflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for ToolflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for ToolflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl ToolflowError {
    /// Create a tool not found error listing the registered tools
    pub fn tool_not_found<S: AsRef<str>>(tool: &str, available: &[S]) -> Self {
        let available = if available.is_empty() {
            "(none)".to_string()
        } else {
            available
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            available,
        }
    }

    /// Whether this error was raised while building the dependency graph
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency { .. }
                | Self::UnknownDependency { .. }
                | Self::DuplicateStepName { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = ToolflowError::CyclicDependency {
            steps: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_tool_not_found_lists_available() {
        let err = ToolflowError::tool_not_found("lint", &["shell", "echo"]);
        match err {
            ToolflowError::ToolNotFound { tool, available } => {
                assert_eq!(tool, "lint");
                assert_eq!(available, "shell, echo");
            }
            other => panic!("unexpected error: {other}"),
        }

        let empty: [&str; 0] = [];
        assert!(!ToolflowError::tool_not_found("x", &empty).is_construction_error());
    }
}
