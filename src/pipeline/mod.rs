// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline definitions and scheduling
//!
//! Steps are declared with their tool, action, parameters and dependencies;
//! the scheduler builds a dependency graph from them and runs them through
//! the step executor, which consults the result cache.

mod dag;
mod definition;
mod events;
mod executor;
mod outcome;
mod scheduler;
mod validation;

pub use dag::DependencyGraph;
pub use definition::*;
pub use events::{EventBus, PipelineEvent};
pub use executor::StepExecutor;
pub use outcome::{PipelineResult, StepOutcome};
pub use scheduler::{PipelineScheduler, RunOptions, SchedulerState};
pub use validation::{PipelineValidator, ValidationResult};
