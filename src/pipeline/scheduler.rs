// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline scheduler
//!
//! Runs a step set to completion: independent steps run concurrently up to a
//! limit, a failed step's dependents are skipped, and sibling branches keep
//! going so the caller gets as much partial information as possible.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::errors::ToolflowResult;
use crate::pipeline::{
    DependencyGraph, EventBus, PipelineEvent, PipelineResult, StepContext, StepDefinition,
    StepExecutor, StepOutcome,
};

/// Scheduling options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum steps executing at once (values below 1 mean 1)
    pub concurrency_limit: usize,
    /// Deadline after which nothing new is launched
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            timeout: None,
        }
    }
}

/// Lifecycle of a scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Pending,
    Running,
    Completed,
}

/// Bookkeeping for one run; owned by the scheduler loop only
struct RunState {
    succeeded: HashSet<String>,
    finished: HashSet<String>,
    /// Launched steps and when they were launched
    in_flight: HashMap<String, Instant>,
    outcomes: Vec<StepOutcome>,
}

impl RunState {
    fn new() -> Self {
        Self {
            succeeded: HashSet::new(),
            finished: HashSet::new(),
            in_flight: HashMap::new(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: StepOutcome) {
        self.in_flight.remove(&outcome.name);
        if outcome.success {
            self.succeeded.insert(outcome.name.clone());
        }
        self.finished.insert(outcome.name.clone());
        self.outcomes.push(outcome);
    }
}

/// Drives a step set through dependency-ordered, concurrent execution
pub struct PipelineScheduler {
    executor: Arc<StepExecutor>,
    context: Arc<StepContext>,
    events: EventBus,
    state: SchedulerState,
}

impl PipelineScheduler {
    /// Create a scheduler
    pub fn new(executor: StepExecutor, context: StepContext) -> Self {
        Self {
            executor: Arc::new(executor),
            context: Arc::new(context),
            events: EventBus::default(),
            state: SchedulerState::Pending,
        }
    }

    /// Publish run progress on the given bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Execute all steps and aggregate their outcomes
    ///
    /// Fails only when the step set itself is malformed (duplicate names,
    /// unknown dependencies, cycles); nothing runs in that case. Tool failures
    /// and timeouts are reported inside the returned [`PipelineResult`].
    pub async fn run(
        &mut self,
        steps: Vec<StepDefinition>,
        options: &RunOptions,
    ) -> ToolflowResult<PipelineResult> {
        let graph = DependencyGraph::build(&steps)?;
        let definitions: HashMap<String, StepDefinition> =
            steps.into_iter().map(|s| (s.name.clone(), s)).collect();

        self.state = SchedulerState::Running;

        let start = Instant::now();
        let deadline = options.timeout.map(|t| start + t);
        let limit = options.concurrency_limit.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut join_set: JoinSet<StepOutcome> = JoinSet::new();
        let mut run = RunState::new();

        tracing::info!(steps = graph.len(), concurrency = limit, "Starting pipeline run");
        self.events.publish(PipelineEvent::RunStarted { steps: graph.len() });

        while run.finished.len() < graph.len() {
            self.skip_blocked(&graph, &mut run);

            if run.finished.len() == graph.len() {
                break;
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                self.finalize_timed_out(&graph, &mut run, &mut join_set, options);
                break;
            }

            for name in graph.ready_steps(&run.succeeded, &run.finished) {
                if run.in_flight.contains_key(&name) {
                    continue;
                }

                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };

                let step = definitions[&name].clone();
                let executor = self.executor.clone();
                let context = self.context.clone();

                tracing::debug!(step = %name, "Launching step");
                self.events.publish(PipelineEvent::StepStarted { name: name.clone() });
                run.in_flight.insert(name.clone(), Instant::now());

                join_set.spawn(async move {
                    let _permit = permit;
                    let started = Instant::now();
                    let step_name = step.name.clone();

                    // A panicking tool still yields exactly one outcome
                    let task = tokio::spawn(async move { executor.execute(&step, &context).await });
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => StepOutcome::failure(
                            &step_name,
                            format!("step '{}' aborted: {}", step_name, e),
                            started.elapsed(),
                        ),
                    }
                });
            }

            if join_set.is_empty() {
                // Nothing running and nothing launchable: every remaining step
                // is blocked, which the next skip pass resolves
                continue;
            }

            let joined = match deadline {
                Some(deadline) => {
                    tokio::select! {
                        joined = join_set.join_next() => joined,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.finalize_timed_out(&graph, &mut run, &mut join_set, options);
                            break;
                        }
                    }
                }
                None => join_set.join_next().await,
            };

            match joined {
                Some(Ok(outcome)) => {
                    if outcome.success {
                        tracing::debug!(step = %outcome.name, cache_hit = outcome.cache_hit, "Step succeeded");
                    } else {
                        tracing::info!(step = %outcome.name, error = ?outcome.error, "Step failed");
                    }
                    self.events.publish(PipelineEvent::StepFinished {
                        outcome: outcome.clone(),
                    });
                    run.record(outcome);
                }
                Some(Err(e)) => {
                    // The wrapper task itself never panics; only cancellation
                    // lands here, and this loop never cancels
                    tracing::warn!(error = %e, "Step task ended unexpectedly");
                }
                None => {}
            }
        }

        let result = PipelineResult::from_outcomes(run.outcomes, start.elapsed());
        self.state = SchedulerState::Completed;

        tracing::info!(
            success = result.success,
            steps = result.steps.len(),
            failed = result.errors.len(),
            duration_ms = result.total_duration.as_millis() as u64,
            "Pipeline run completed"
        );
        self.events.publish(PipelineEvent::RunCompleted {
            success: result.success,
            duration: result.total_duration,
        });

        Ok(result)
    }

    /// Finalize every step that has a dependency which finished without
    /// success, repeating until skips stop cascading
    fn skip_blocked(&self, graph: &DependencyGraph, run: &mut RunState) {
        loop {
            let blocked = graph.blocked_steps(&run.succeeded, &run.finished);
            if blocked.is_empty() {
                return;
            }

            for name in blocked {
                let failed: Vec<String> = graph
                    .dependencies(&name)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|dep| run.finished.contains(dep) && !run.succeeded.contains(dep))
                    .collect();
                let reason = format!("dependency did not succeed: {}", failed.join(", "));

                tracing::debug!(step = %name, %reason, "Skipping step");
                self.events.publish(PipelineEvent::StepSkipped {
                    name: name.clone(),
                    reason: reason.clone(),
                });
                run.record(StepOutcome::skipped(&name, reason));
            }
        }
    }

    /// Deadline passed: in-flight tasks are detached, not interrupted, and
    /// every unfinished step becomes a timeout failure
    fn finalize_timed_out(
        &self,
        graph: &DependencyGraph,
        run: &mut RunState,
        join_set: &mut JoinSet<StepOutcome>,
        options: &RunOptions,
    ) {
        join_set.detach_all();

        let timeout = options.timeout.unwrap_or_default();
        let remaining: Vec<String> = graph
            .names()
            .iter()
            .filter(|name| !run.finished.contains(*name))
            .cloned()
            .collect();

        tracing::warn!(
            timeout_ms = timeout.as_millis() as u64,
            unfinished = remaining.len(),
            "Pipeline run timed out"
        );

        for name in remaining {
            let duration = run
                .in_flight
                .get(&name)
                .map_or(Duration::ZERO, |launched| launched.elapsed());
            let outcome = StepOutcome::timed_out(&name, timeout, duration);
            self.events.publish(PipelineEvent::StepFinished {
                outcome: outcome.clone(),
            });
            run.record(outcome);
        }
    }
}

impl std::fmt::Debug for PipelineScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineScheduler")
            .field("executor", &self.executor)
            .field("context", &self.context)
            .field("state", &self.state)
            .finish()
    }
}
