// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for toolflow.

pub mod graph;
pub mod run;
pub mod validate;
pub mod workflow;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Concurrent tool pipeline runner
#[derive(Parser, Debug)]
#[clap(
    name = "toolflow",
    version,
    about = "Run tool pipelines concurrently with a content-addressed result cache",
    long_about = None,
    after_help = "Examples:\n\
        toolflow run                          Execute .toolflow.yaml\n\
        toolflow validate ci.toml             Check a pipeline file\n\
        toolflow graph -f mermaid             Show the dependency graph\n\
        toolflow workflow pre-commit src/*.rs Print a ready-made workflow\n\n\
        See 'toolflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        /// Pipeline file (YAML, or TOML with a .toml extension)
        #[clap(short, long, default_value = ".toolflow.yaml")]
        pipeline: PathBuf,

        /// Maximum steps running at once (overrides the pipeline file)
        #[clap(long, env = "TOOLFLOW_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Run deadline in seconds (overrides the pipeline file)
        #[clap(long)]
        timeout: Option<u64>,

        /// Skip cache (force re-execution)
        #[clap(long)]
        no_cache: bool,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = ".toolflow.yaml")]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = ".toolflow.yaml")]
        pipeline: PathBuf,

        /// Output format (text, dot, mermaid)
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Build a ready-made workflow over a set of files
    Workflow {
        /// Workflow name (pre-commit, pre-merge)
        name: String,

        /// Files or glob patterns
        #[clap(required = true)]
        files: Vec<String>,

        /// Shell command template; {action} and {file} are substituted
        #[clap(short, long)]
        command: Option<String>,

        /// Execute the workflow instead of printing it
        #[clap(long, requires = "command")]
        run: bool,

        /// Maximum steps running at once when executing
        #[clap(long, default_value = "4")]
        concurrency: usize,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}
