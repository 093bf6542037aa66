// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline definition structures
//!
//! Defines steps and the schema for .toolflow.yaml files.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::HashStrategy;
use crate::errors::ToolflowError;
use crate::pipeline::RunOptions;

/// Pipeline definition from .toolflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Scheduling options
    #[serde(default)]
    pub options: PipelineOptions,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Steps, in declaration order
    pub steps: Vec<StepDefinition>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Pipeline {
    /// Wrap a list of steps with default options
    pub fn new(name: &str, steps: Vec<StepDefinition>) -> Self {
        Self {
            version: default_version(),
            name: name.to_string(),
            description: None,
            options: PipelineOptions::default(),
            cache: CacheConfig::default(),
            steps,
        }
    }

    /// Load pipeline from a YAML or TOML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ToolflowError> {
        if !path.exists() {
            return Err(ToolflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ToolflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ToolflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse pipeline from TOML string
    pub fn from_toml(source: &str) -> Result<Self, ToolflowError> {
        toml::from_str(source).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, ToolflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// One named unit of work bound to a tool and action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name (must be unique within pipeline)
    pub name: String,

    /// Step description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Registered tool to invoke
    pub tool: String,

    /// Operation the tool should perform
    pub action: String,

    /// Parameters passed verbatim to the tool
    #[serde(default)]
    pub params: Value,

    /// Subject identifier for cache keying (e.g. a file path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Steps that must succeed before this one runs
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl StepDefinition {
    pub fn new(name: &str, tool: &str, action: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            tool: tool.to_string(),
            action: action.to_string(),
            params: Value::Null,
            subject: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Add dependencies
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// Read-only context shared by every step of a run
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Project root that relative subjects resolve against
    pub root: PathBuf,
}

impl StepContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a subject path against the root
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl Default for StepContext {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Scheduling options as written in the pipeline file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum steps running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-run deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

impl PipelineOptions {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency_limit: self.concurrency,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Enable caching
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached results
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How cache subjects are derived from steps
    #[serde(default)]
    pub strategy: HashStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
            strategy: HashStrategy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    256
}

fn default_ttl_secs() -> u64 {
    3600
}
