//! Typed pipeline output
//!
//! Every tick returns its events by value. A caller that prefers push
//! delivery can also attach an `EventSink`; the pipeline drops the sink
//! on shutdown, before any component state goes away.

use serde::{Deserialize, Serialize};

use crate::session::StatsSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    CalibrationComplete { base_height: f32 },
    RunIntensity { intensity: f32 },
    JumpDetected { count: u32 },
    SquatStateChanged { squatting: bool },
    SquatCompleted { count: u32 },
    Stats(StatsSnapshot),
}

impl PipelineEvent {
    /// Short label for logs and visualization paths.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::CalibrationComplete { .. } => "calibration_complete",
            PipelineEvent::RunIntensity { .. } => "run_intensity",
            PipelineEvent::JumpDetected { .. } => "jump",
            PipelineEvent::SquatStateChanged { .. } => "squat_state",
            PipelineEvent::SquatCompleted { .. } => "squat_completed",
            PipelineEvent::Stats(_) => "stats",
        }
    }

    /// Discrete gameplay events, as opposed to continuous intensity or stats.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, PipelineEvent::RunIntensity { .. } | PipelineEvent::Stats(_))
    }
}

/// Push-style consumer of pipeline events.
pub trait EventSink {
    fn publish(&mut self, event: &PipelineEvent);
}

impl EventSink for Vec<PipelineEvent> {
    fn publish(&mut self, event: &PipelineEvent) {
        self.push(event.clone());
    }
}

impl EventSink for crossbeam::channel::Sender<PipelineEvent> {
    fn publish(&mut self, event: &PipelineEvent) {
        // Receiver gone or full: the tick loop must not stall on a consumer.
        if let Err(e) = self.try_send(event.clone()) {
            log::debug!("Dropped {} event: {}", event.name(), e);
        }
    }
}
