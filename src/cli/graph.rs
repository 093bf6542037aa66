// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::{DependencyGraph, Pipeline};

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let pipeline = Pipeline::from_file(&pipeline_path)?;
    let dag = DependencyGraph::build(&pipeline.steps)?;

    println!("{}", render(&dag, &pipeline, format));

    Ok(())
}

fn render(dag: &DependencyGraph, pipeline: &Pipeline, format: GraphFormat) -> String {
    match format {
        GraphFormat::Text => dag.to_text(&pipeline.steps),
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    }
}
