use anyhow::Result;
use rerun::{archetypes::Scalar, RecordingStreamBuilder};

use crate::events::PipelineEvent;
use crate::locomotion::Displacement;
use crate::pipeline::PipelineSnapshot;

/// Rerun time-series logger for pipeline replays.
/// Uses the Rerun v0.15+ archetype API.
pub struct RerunLogger {
    rec: rerun::RecordingStream,
}

impl RerunLogger {
    /// Record to an `.rrd` file.
    pub fn new(output_path: &str) -> Result<Self> {
        let rec = RecordingStreamBuilder::new("saga_motion")
            .save(output_path)
            .map_err(|e| anyhow::anyhow!("Failed to create Rerun recording: {}", e))?;

        log::info!("[RERUN] Recording initialized to: {}", output_path);

        Ok(RerunLogger { rec })
    }

    pub fn set_time(&self, elapsed_secs: f64) {
        self.rec.set_time_seconds("stable_time", elapsed_secs);
    }

    pub fn log_scalar(&self, path: &str, value: f64) {
        let _ = self.rec.log(path, &Scalar::new(value));
    }

    pub fn log_head(&self, head_y: f32, height_delta: Option<f32>) {
        self.log_scalar("input/head_y", head_y as f64);
        if let Some(delta) = height_delta {
            self.log_scalar("input/head_delta", delta as f64);
        }
    }

    /// Analyzer, locomotion and session state after a tick.
    pub fn log_tick(&self, snapshot: &PipelineSnapshot, displacement: &Displacement) {
        self.log_scalar("analyzers/run_factor", snapshot.run.run_factor as f64);
        self.log_scalar("analyzers/jump_cooldown", snapshot.jump.cooldown_remaining as f64);
        self.log_scalar("analyzers/squatting", snapshot.squat.phase as u8 as f64);

        self.log_scalar("locomotion/speed", displacement.horizontal_speed as f64);
        self.log_scalar("locomotion/height", snapshot.locomotion.height as f64);
        self.log_scalar("locomotion/vertical_velocity", snapshot.locomotion.vertical_velocity as f64);

        self.log_scalar("session/distance", snapshot.stats.distance as f64);
    }

    /// Discrete events as spikes under `events/<name>`.
    pub fn log_events(&self, events: &[PipelineEvent]) {
        for event in events.iter().filter(|e| e.is_discrete()) {
            let value = match *event {
                PipelineEvent::CalibrationComplete { base_height } => base_height as f64,
                PipelineEvent::JumpDetected { count } => count as f64,
                PipelineEvent::SquatCompleted { count } => count as f64,
                PipelineEvent::SquatStateChanged { squatting } => squatting as u8 as f64,
                _ => 1.0,
            };
            self.log_scalar(&format!("events/{}", event.name()), value);
        }
    }
}
