// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Content hashing for cache keys
//!
//! Uses BLAKE3 for fast, secure content hashing. What counts as a step's
//! "subject" varies by tool, so the key derivation is pluggable through
//! [`SubjectHasher`].

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::errors::ToolflowError;
use crate::pipeline::{StepContext, StepDefinition};

/// Content hasher for generating cache keys
pub struct ContentHasher {
    hasher: Hasher,
}

impl ContentHasher {
    /// Create a new content hasher
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Hash the parts of a step that select the tool behaviour
    pub fn hash_step(&mut self, step: &StepDefinition) {
        self.hasher.update(step.tool.as_bytes());
        self.hasher.update(&[0]);
        self.hash_json(&step.params);
    }

    /// Hash a JSON value in canonical form (object keys sorted)
    pub fn hash_json(&mut self, value: &Value) {
        let mut buf = String::new();
        write_canonical(value, &mut buf);
        self.hasher.update(buf.as_bytes());
    }

    /// Hash a single file's contents
    pub fn hash_file(&mut self, path: &Path) -> Result<(), ToolflowError> {
        let content = std::fs::read(path).map_err(|e| ToolflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        self.hasher.update(&content);
        Ok(())
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize and get the hash
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Compute a quick hash of a string
pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Compute a hash of raw bytes
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

/// Compute a canonical hash of a JSON value
pub fn hash_json(value: &Value) -> String {
    let mut hasher = ContentHasher::new();
    hasher.hash_json(value);
    hasher.finalize()
}

/// Compute hash of a file
pub fn hash_file(path: &Path) -> Result<String, ToolflowError> {
    let mut hasher = ContentHasher::new();
    hasher.hash_file(path)?;
    Ok(hasher.finalize())
}

/// Subject identifier and content hash of one step invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKey {
    pub subject: String,
    pub content_hash: String,
}

/// Strategy deciding what a step's cache subject is and how its input is hashed
pub trait SubjectHasher: Send + Sync {
    fn subject_key(
        &self,
        step: &StepDefinition,
        context: &StepContext,
    ) -> Result<SubjectKey, ToolflowError>;
}

/// Hashes the tool name and parameters; the subject is the step's declared
/// subject, or its name when none is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsHasher;

impl SubjectHasher for ParamsHasher {
    fn subject_key(
        &self,
        step: &StepDefinition,
        _context: &StepContext,
    ) -> Result<SubjectKey, ToolflowError> {
        let mut hasher = ContentHasher::new();
        hasher.hash_step(step);

        Ok(SubjectKey {
            subject: step.subject.clone().unwrap_or_else(|| step.name.clone()),
            content_hash: hasher.finalize(),
        })
    }
}

/// Treats a file as the subject and hashes its current bytes together with the
/// step parameters.
///
/// The file is `step.subject` or, failing that, the `file` parameter; paths are
/// resolved against the context root. Steps that name no file are hashed like
/// [`ParamsHasher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentHasher;

impl SubjectHasher for FileContentHasher {
    fn subject_key(
        &self,
        step: &StepDefinition,
        context: &StepContext,
    ) -> Result<SubjectKey, ToolflowError> {
        let file = step
            .subject
            .as_deref()
            .or_else(|| step.params.get("file").and_then(Value::as_str));

        let Some(file) = file else {
            return ParamsHasher.subject_key(step, context);
        };

        let mut hasher = ContentHasher::new();
        hasher.hash_file(&context.resolve(file))?;
        hasher.update(&[0]);
        hasher.hash_step(step);

        Ok(SubjectKey {
            subject: file.to_string(),
            content_hash: hasher.finalize(),
        })
    }
}

/// Configurable choice of [`SubjectHasher`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashStrategy {
    /// Hash the step parameters (default)
    #[default]
    Params,
    /// Hash the contents of the step's subject file
    FileContent,
}

impl HashStrategy {
    pub fn hasher(self) -> Arc<dyn SubjectHasher> {
        match self {
            Self::Params => Arc::new(ParamsHasher),
            Self::FileContent => Arc::new(FileContentHasher),
        }
    }
}
