// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Step executor
//!
//! Runs a single step: consult the cache, invoke the tool on a miss, store
//! successful results. Failures are returned as outcomes and never cached.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{ParamsHasher, ResultCache, SubjectHasher, SubjectKey};
use crate::pipeline::{StepContext, StepDefinition, StepOutcome};
use crate::tools::ToolRegistry;

/// Executes one step definition against the tool registry
#[derive(Clone)]
pub struct StepExecutor {
    registry: Arc<ToolRegistry>,
    cache: Option<Arc<ResultCache>>,
    hasher: Arc<dyn SubjectHasher>,
}

impl StepExecutor {
    /// Create an executor without a cache
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            hasher: Arc::new(ParamsHasher),
        }
    }

    /// Set the cache layer
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the strategy deriving cache subjects and hashes
    pub fn with_hasher(mut self, hasher: Arc<dyn SubjectHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Execute a step and return its outcome
    pub async fn execute(&self, step: &StepDefinition, context: &StepContext) -> StepOutcome {
        let start = Instant::now();

        let cached = self.cache.as_ref().and_then(|cache| {
            let key = self.cache_key(step, context)?;
            Some((cache, key))
        });

        if let Some((cache, key)) = &cached {
            if let Some(value) = cache.get(&key.subject, &step.action, &key.content_hash) {
                tracing::debug!(step = %step.name, subject = %key.subject, "Cache hit");
                return StepOutcome::cached(&step.name, value, start.elapsed());
            }
            tracing::debug!(step = %step.name, subject = %key.subject, "Cache miss");
        }

        match self
            .registry
            .invoke(&step.tool, &step.action, &step.params)
            .await
        {
            Ok(value) => {
                if let Some((cache, key)) = &cached {
                    cache.set(&key.subject, &step.action, &key.content_hash, value.clone());
                }
                StepOutcome::success(&step.name, value, start.elapsed())
            }
            Err(e) => {
                tracing::debug!(step = %step.name, error = %e, "Step failed");
                StepOutcome::failure(&step.name, e.to_string(), start.elapsed())
            }
        }
    }

    /// Derive the cache key; a hashing failure bypasses the cache for this step
    fn cache_key(&self, step: &StepDefinition, context: &StepContext) -> Option<SubjectKey> {
        match self.hasher.subject_key(step, context) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(step = %step.name, error = %e, "Could not derive cache key, bypassing cache");
                None
            }
        }
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
