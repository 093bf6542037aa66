// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Progress indicators for pipeline runs

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::pipeline::PipelineEvent;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a progress bar over a known number of steps
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.blue} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Reflect a pipeline event on a progress bar
pub fn track_event(pb: &ProgressBar, event: &PipelineEvent) {
    match event {
        PipelineEvent::RunStarted { steps } => pb.set_length(*steps as u64),
        PipelineEvent::StepStarted { name } => pb.set_message(name.clone()),
        PipelineEvent::StepFinished { .. } | PipelineEvent::StepSkipped { .. } => pb.inc(1),
        PipelineEvent::RunCompleted { .. } => pb.finish_and_clear(),
    }
}

/// Feed a progress bar until the event bus closes
///
/// A receiver that fell behind skips the overwritten events and carries on.
pub async fn follow_events(pb: ProgressBar, mut events: broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => track_event(&pb, &event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "Progress display fell behind the event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{EventBus, StepOutcome};

    #[test]
    fn test_track_event_counts_steps() {
        let pb = ProgressBar::hidden();

        track_event(&pb, &PipelineEvent::RunStarted { steps: 3 });
        track_event(&pb, &PipelineEvent::StepStarted { name: "a".into() });
        track_event(
            &pb,
            &PipelineEvent::StepFinished {
                outcome: StepOutcome::failure("a", "boom", Duration::ZERO),
            },
        );
        track_event(
            &pb,
            &PipelineEvent::StepSkipped {
                name: "b".into(),
                reason: "dependency 'a' failed".into(),
            },
        );

        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.message(), "a");
    }

    #[tokio::test]
    async fn test_follow_events_survives_lag() {
        let bus = EventBus::new(2);
        let rx = bus.subscribe();
        let pb = ProgressBar::hidden();

        bus.publish(PipelineEvent::RunStarted { steps: 3 });
        bus.publish(PipelineEvent::StepStarted { name: "a".into() });
        bus.publish(PipelineEvent::StepFinished {
            outcome: StepOutcome::success("a", serde_json::Value::Null, Duration::ZERO),
        });
        bus.publish(PipelineEvent::StepSkipped {
            name: "b".into(),
            reason: "dependency 'a' failed".into(),
        });
        drop(bus);

        follow_events(pb.clone(), rx).await;

        // The two oldest events were overwritten; the rest still count
        assert_eq!(pb.position(), 2);
    }
}
