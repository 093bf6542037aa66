// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Tool capabilities
//!
//! A tool is an opaque capability invoked by name with an action and a JSON
//! parameter bag. The registry resolves names and gives every tool the same
//! invocation signature, whatever it does underneath.

mod shell;

pub use shell::ShellTool;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::errors::{ToolflowError, ToolflowResult};
use crate::pipeline::StepDefinition;

/// Failure reported by a tool invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ToolError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ToolError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Trait for invocable tools
///
/// Implementations must be safe to call concurrently for distinct
/// invocations. They need not be idempotent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Perform `action` with the given parameters
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, ToolError>;

    /// Check if the tool can run on this machine
    async fn check_available(&self) -> bool {
        true
    }
}

/// Adapts an async closure into a [`Tool`]
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, ToolError> {
        (self.f)(action.to_string(), params.clone()).await
    }
}

/// Name-keyed map of registered tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name
    pub fn register(&mut self, name: &str, tool: impl Tool + 'static) {
        self.tools.insert(name.to_string(), Arc::new(tool));
    }

    /// Register a closure as a tool
    pub fn register_fn<F, Fut>(&mut self, name: &str, f: F)
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.register(name, FnTool::new(f));
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a registered tool
    pub async fn invoke(&self, name: &str, action: &str, params: &Value) -> ToolflowResult<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolflowError::tool_not_found(name, &self.names()))?;

        tool.invoke(action, params)
            .await
            .map_err(|e| ToolflowError::ToolInvocation {
                tool: name.to_string(),
                message: e.message,
            })
    }

    /// Tools referenced by `steps` that are unregistered or unavailable
    pub async fn check_tools(&self, steps: &[StepDefinition]) -> Vec<String> {
        let mut missing = Vec::new();

        let mut tool_names: Vec<&str> = steps.iter().map(|s| s.tool.as_str()).collect();
        tool_names.sort_unstable();
        tool_names.dedup();

        for name in tool_names {
            let available = match self.tools.get(name) {
                Some(tool) => tool.check_available().await,
                None => false,
            };

            if !available {
                missing.push(name.to_string());
            }
        }

        missing
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Create a registry with the built-in tools
pub fn create_default_registry(working_dir: std::path::PathBuf) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register("shell", ShellTool::new(working_dir));
    registry
}
