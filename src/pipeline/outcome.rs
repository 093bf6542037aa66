// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Step outcomes and the aggregated pipeline result

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Terminal state of one step in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub success: bool,
    /// Tool payload on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Never attempted because a dependency did not succeed
    #[serde(default)]
    pub skipped: bool,
    /// Payload came from the result cache
    #[serde(default)]
    pub cache_hit: bool,
}

impl StepOutcome {
    /// Create a successful outcome
    pub fn success(name: &str, data: Value, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            data: Some(data),
            error: None,
            duration,
            skipped: false,
            cache_hit: false,
        }
    }

    /// Create a successful outcome served from the cache
    pub fn cached(name: &str, data: Value, duration: Duration) -> Self {
        Self {
            cache_hit: true,
            ..Self::success(name, data, duration)
        }
    }

    /// Create a failed outcome
    pub fn failure(name: &str, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            data: None,
            error: Some(error.into()),
            duration,
            skipped: false,
            cache_hit: false,
        }
    }

    /// Create an outcome for a step that never ran
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::failure(name, reason, Duration::ZERO)
        }
    }

    /// Create a failure for a step cut off by the run deadline
    pub fn timed_out(name: &str, timeout: Duration, duration: Duration) -> Self {
        Self::failure(
            name,
            format!("step '{}' did not finish before the {:?} run timeout", name, timeout),
            duration,
        )
    }

    /// Ran and failed, as opposed to skipped
    pub fn is_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

/// Aggregated result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// True iff every step succeeded (no failures, no skips)
    pub success: bool,
    /// Outcomes in the order they were finalized
    pub steps: Vec<StepOutcome>,
    #[serde(with = "duration_ms")]
    pub total_duration: Duration,
    /// Failure messages of failed steps, in execution order
    pub errors: Vec<String>,
}

impl PipelineResult {
    /// Assemble the final result from outcomes in completion order
    pub fn from_outcomes(steps: Vec<StepOutcome>, total_duration: Duration) -> Self {
        let success = steps.iter().all(|s| s.success);
        let errors = steps
            .iter()
            .filter(|s| s.is_failure())
            .filter_map(|s| s.error.clone())
            .collect();

        Self {
            success,
            steps,
            total_duration,
            errors,
        }
    }

    /// Get the outcome of a step by name
    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.is_failure())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.skipped)
    }

    pub fn cache_hits(&self) -> usize {
        self.steps.iter().filter(|s| s.cache_hit).count()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_success_requires_no_failures_or_skips() {
        let ok = PipelineResult::from_outcomes(
            vec![
                StepOutcome::success("a", json!(1), Duration::from_millis(5)),
                StepOutcome::cached("b", json!(2), Duration::ZERO),
            ],
            Duration::from_millis(5),
        );
        assert!(ok.success);
        assert!(ok.errors.is_empty());
        assert_eq!(ok.cache_hits(), 1);

        let skipped = PipelineResult::from_outcomes(
            vec![
                StepOutcome::success("a", json!(1), Duration::ZERO),
                StepOutcome::skipped("b", "dependency 'x' failed"),
            ],
            Duration::ZERO,
        );
        assert!(!skipped.success);
        // Skips are not failures, so they add no error message
        assert!(skipped.errors.is_empty());
        assert_eq!(skipped.skipped().count(), 1);
    }

    #[test]
    fn test_errors_follow_execution_order() {
        let result = PipelineResult::from_outcomes(
            vec![
                StepOutcome::failure("late", "second", Duration::ZERO),
                StepOutcome::success("ok", json!(null), Duration::ZERO),
                StepOutcome::failure("early", "first", Duration::ZERO),
            ],
            Duration::ZERO,
        );

        assert_eq!(result.errors, vec!["second", "first"]);
        assert_eq!(result.failed().count(), 2);
        assert_eq!(result.succeeded().count(), 1);
        assert!(result.step("ok").unwrap().success);
    }

    #[test]
    fn test_outcome_serializes_duration_as_millis() {
        let outcome = StepOutcome::success("a", json!({ "n": 1 }), Duration::from_millis(1500));
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["duration"], 1500);
        assert!(value.get("error").is_none());

        let back: StepOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }
}
