// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Run progress notifications
//!
//! Events go out on a broadcast channel. Publishing never waits, and a slow
//! or absent subscriber only loses events; the scheduler's ordering does not
//! depend on anyone listening.

use std::time::Duration;
use tokio::sync::broadcast;

use crate::pipeline::StepOutcome;

const DEFAULT_CAPACITY: usize = 1024;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted { steps: usize },
    StepStarted { name: String },
    StepFinished { outcome: StepOutcome },
    StepSkipped { name: String, reason: String },
    RunCompleted { success: bool, duration: Duration },
}

/// Broadcast channel for [`PipelineEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: PipelineEvent) {
        // No receivers is not an error
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
