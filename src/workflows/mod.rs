// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Ready-made workflows
//!
//! Builds common step sets from a list of files. Per-file steps carry the file
//! as their cache subject. Edits to a file only invalidate its entries when the
//! pipeline hashes file contents (`cache.strategy: file-content`); the default
//! strategy hashes parameters, which name the file but not its bytes.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::errors::ToolflowError;
use crate::pipeline::StepDefinition;

/// Name of the final aggregating step in every workflow
pub const REPORT_STEP: &str = "report";

/// Known workflow kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Per-file checks followed by a report
    PreCommit,
    /// Per-file checks and analysis, a cross-file pattern pass, then a report
    PreMerge,
}

impl std::str::FromStr for WorkflowKind {
    type Err = ToolflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre-commit" | "precommit" => Ok(Self::PreCommit),
            "pre-merge" | "premerge" => Ok(Self::PreMerge),
            _ => Err(ToolflowError::UnknownWorkflow {
                name: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreCommit => write!(f, "pre-commit"),
            Self::PreMerge => write!(f, "pre-merge"),
        }
    }
}

/// Builds step sets with pre-wired dependencies
#[derive(Debug, Clone)]
pub struct WorkflowFactory {
    tool: String,
    /// Shell command template; `{action}` and `{file}` are substituted, with
    /// file names shell-quoted
    command: Option<String>,
}

impl WorkflowFactory {
    /// Steps invoke `tool` with the file and root in their parameters
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            command: None,
        }
    }

    /// Steps run `template` through the shell tool
    pub fn shell(template: &str) -> Self {
        Self {
            tool: "shell".to_string(),
            command: Some(template.to_string()),
        }
    }

    pub fn build(&self, kind: WorkflowKind, files: &[String], root: &Path) -> Vec<StepDefinition> {
        match kind {
            WorkflowKind::PreCommit => self.pre_commit(files, root),
            WorkflowKind::PreMerge => self.pre_merge(files, root),
        }
    }

    /// Build a workflow by name
    pub fn by_name(
        &self,
        name: &str,
        files: &[String],
        root: &Path,
    ) -> Result<Vec<StepDefinition>, ToolflowError> {
        Ok(self.build(name.parse()?, files, root))
    }

    /// `check:<file>` for every file, then `report` over all of them
    pub fn pre_commit(&self, files: &[String], root: &Path) -> Vec<StepDefinition> {
        let files = dedup(files);
        let mut steps: Vec<StepDefinition> = files
            .iter()
            .map(|file| self.file_step("check", file, root, Vec::new()))
            .collect();

        let checks: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
        steps.push(self.aggregate_step(REPORT_STEP, "report", &files, root, checks));
        steps
    }

    /// `check:<file>` then `analyze:<file>` per file, a cross-file `patterns`
    /// pass over every analysis, then `report`
    pub fn pre_merge(&self, files: &[String], root: &Path) -> Vec<StepDefinition> {
        let files = dedup(files);
        let mut steps = Vec::with_capacity(files.len() * 2 + 2);
        let mut analyses = Vec::with_capacity(files.len());

        for file in &files {
            let check = self.file_step("check", file, root, Vec::new());
            let analyze = self.file_step("analyze", file, root, vec![check.name.clone()]);
            analyses.push(analyze.name.clone());
            steps.push(check);
            steps.push(analyze);
        }

        steps.push(self.aggregate_step("patterns", "patterns", &files, root, analyses));
        steps.push(self.aggregate_step(
            REPORT_STEP,
            "report",
            &files,
            root,
            vec!["patterns".to_string()],
        ));
        steps
    }

    fn file_step(&self, action: &str, file: &str, root: &Path, deps: Vec<String>) -> StepDefinition {
        let mut params = json!({
            "file": file,
            "root": root.display().to_string(),
        });
        self.add_command(&mut params, action, &shell_quote(file));

        StepDefinition::new(&format!("{}:{}", action, file), &self.tool, action)
            .with_subject(file)
            .with_params(params)
            .depends_on(deps)
    }

    fn aggregate_step(
        &self,
        name: &str,
        action: &str,
        files: &[String],
        root: &Path,
        deps: Vec<String>,
    ) -> StepDefinition {
        let mut params = json!({
            "files": files,
            "root": root.display().to_string(),
        });
        let quoted: Vec<String> = files.iter().map(|f| shell_quote(f)).collect();
        self.add_command(&mut params, action, &quoted.join(" "));

        StepDefinition::new(name, &self.tool, action)
            .with_params(params)
            .depends_on(deps)
    }

    fn add_command(&self, params: &mut Value, action: &str, file_args: &str) {
        if let (Some(template), Some(map)) = (&self.command, params.as_object_mut()) {
            let command = template
                .replace("{action}", action)
                .replace("{file}", file_args);
            map.insert("command".to_string(), Value::String(command));
        }
    }
}

impl Default for WorkflowFactory {
    fn default() -> Self {
        Self::new("analyzer")
    }
}

/// Quote a file name for `sh -c`; names without special characters pass as-is
fn shell_quote(file: &str) -> String {
    // NUL cannot reach a shell argument, and is the only input try_quote rejects
    let clean = file.replace('\0', "");
    match shlex::try_quote(&clean) {
        Ok(quoted) => quoted.into_owned(),
        Err(_) => clean,
    }
}

fn dedup(files: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    files
        .iter()
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect()
}

/// Expand glob patterns relative to `root`; plain paths pass through
pub fn expand_files(patterns: &[String], root: &Path) -> Result<Vec<String>, ToolflowError> {
    let mut files = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(pattern.clone());
            continue;
        }

        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            // The root is a literal path; only the pattern may glob
            let root = glob::Pattern::escape(&root.to_string_lossy());
            Path::new(&root).join(pattern).to_string_lossy().to_string()
        };

        let mut matches: Vec<PathBuf> = glob::glob(&full_pattern)?.filter_map(Result::ok).collect();
        matches.sort();

        for path in matches {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            files.push(relative.to_string_lossy().to_string());
        }
    }

    Ok(dedup(&files))
}
