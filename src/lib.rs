// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! # toolflow - Concurrent Tool Pipelines
//!
//! `toolflow` runs named tool invocations in dependency order, as many at once
//! as a concurrency limit allows, and remembers their results in a
//! content-addressed cache.
//!
//! ## Features
//!
//! - **Dependency scheduling** - Steps run as soon as their dependencies succeed
//! - **Failure isolation** - A failed step skips its dependents, nothing else
//! - **Result cache** - LRU eviction with a time-to-live, keyed by content hash
//! - **Tool registry** - Plug in any async tool behind a name
//! - **Workflows** - Ready-made pre-commit and pre-merge step sets
//!
//! ## Quick Start
//!
//! ```bash
//! # Run .toolflow.yaml
//! toolflow run
//!
//! # Show the dependency graph
//! toolflow graph -f mermaid
//!
//! # Print a pre-commit workflow over some files
//! toolflow workflow pre-commit 'src/**/*.rs' --command 'lint --{action} {file}'
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod pipeline;
pub mod tools;
pub mod utils;
pub mod workflows;

// Re-export commonly used types
pub use cache::{CacheKey, CacheStats, ResultCache};
pub use errors::{ToolflowError, ToolflowResult};
pub use pipeline::{
    DependencyGraph, Pipeline, PipelineResult, PipelineScheduler, RunOptions, StepContext,
    StepDefinition, StepExecutor, StepOutcome,
};
pub use tools::{Tool, ToolError, ToolRegistry};
pub use workflows::WorkflowFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
