use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pipeline::PipelineSnapshot;
use crate::session::SessionPhase;

/// Periodic status file for external watchers of a live session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub session_phase: SessionPhase,
    // Calibration
    pub calibration_complete: bool,
    pub base_height: f32,
    // Analyzers
    pub run_factor: f32,
    pub jump_count: u32,
    pub squatting: bool,
    pub squat_count: u32,
    // Locomotion
    pub speed: f32,
    pub height: f32,
    pub grounded: bool,
    // Session totals
    pub distance: f32,
    pub elapsed: f32,
    pub distance_progress: f32,
    pub goals_met: bool,
    // Source health
    pub source_healthy: bool,
    pub samples_received: u64,
    pub samples_missing: u64,
    /// Samples replaced by a fresher one before their tick ran.
    pub samples_superseded: u64,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            uptime_seconds: 0,
            session_phase: SessionPhase::Idle,
            calibration_complete: false,
            base_height: 0.0,
            run_factor: 0.0,
            jump_count: 0,
            squatting: false,
            squat_count: 0,
            speed: 0.0,
            height: 0.0,
            grounded: true,
            distance: 0.0,
            elapsed: 0.0,
            distance_progress: 0.0,
            goals_met: false,
            source_healthy: true,
            samples_received: 0,
            samples_missing: 0,
            samples_superseded: 0,
        }
    }

    pub fn update(&mut self, snapshot: &PipelineSnapshot, uptime_seconds: u64) {
        self.timestamp = current_timestamp();
        self.uptime_seconds = uptime_seconds;
        self.session_phase = snapshot.session_phase;
        self.calibration_complete = snapshot.calibration.is_calibrated;
        self.base_height = snapshot.calibration.base_height;
        self.run_factor = snapshot.run.run_factor;
        self.jump_count = snapshot.jump.jump_count;
        self.squatting = snapshot.squat.phase == crate::analyzers::SquatPhase::Squatting;
        self.squat_count = snapshot.squat.squat_count;
        self.speed = snapshot.locomotion.current_speed;
        self.height = snapshot.locomotion.height;
        self.grounded = snapshot.locomotion.grounded;
        self.distance = snapshot.stats.distance;
        self.elapsed = snapshot.stats.elapsed;
        self.distance_progress = snapshot.stats.distance_progress;
        self.goals_met = snapshot.stats.distance_goal_met
            && snapshot.stats.jump_goal_met
            && snapshot.stats.squat_goal_met;
        self.source_healthy = snapshot.source.healthy;
        self.samples_received = snapshot.source.total_received;
        self.samples_missing = snapshot.source.total_missing;
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::Pipeline;
    use crate::types::LandmarkSample;

    #[test]
    fn test_update_from_pipeline() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start_session();
        pipeline.calibrate_now(Some(&LandmarkSample::standing_at(1.62)));
        pipeline.tick(Some(&LandmarkSample::standing_at(1.62)), 0.05);

        let mut status = LiveStatus::new();
        status.update(&pipeline.get_snapshot(), 3);
        assert!(status.calibration_complete);
        assert_eq!(status.session_phase, SessionPhase::Active);
        assert_eq!(status.samples_received, 1);
        assert_eq!(status.uptime_seconds, 3);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["session_phase"], "Active");
    }
}
