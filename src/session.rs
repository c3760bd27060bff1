//! Session statistics and level goals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::events::PipelineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No session started.
    Idle,
    /// Started, waiting for the baseline height.
    WaitingForCalibration,
    /// Accumulating stats.
    Active,
    /// Stopped; totals are frozen.
    Ended,
}

/// Running totals. Only ever grow while a session is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub distance: f32,
    pub jumps: u32,
    pub squats: u32,
    pub elapsed: f32,
}

/// Per-tick view of the totals plus goal progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub distance: f32,
    pub jumps: u32,
    pub squats: u32,
    pub elapsed: f32,
    pub distance_progress: f32,
    pub distance_goal_met: bool,
    pub jump_goal_met: bool,
    pub squat_goal_met: bool,
}

pub struct SessionAggregator {
    config: SessionConfig,
    phase: SessionPhase,
    stats: SessionStats,
    started_at: Option<DateTime<Utc>>,
}

impl SessionAggregator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            config: config.clone(),
            phase: SessionPhase::Idle,
            stats: SessionStats::default(),
            started_at: None,
        }
    }

    /// Arm the aggregator; accumulation starts on `CalibrationComplete`.
    pub fn begin_waiting(&mut self) {
        self.stats = SessionStats::default();
        self.started_at = None;
        self.phase = SessionPhase::WaitingForCalibration;
    }

    /// Reset the totals and start accumulating.
    pub fn start(&mut self) {
        self.stats = SessionStats::default();
        self.started_at = Some(Utc::now());
        self.phase = SessionPhase::Active;
        log::info!("Session started");
    }

    pub fn start_without_calibration(&mut self) {
        log::warn!("Starting session without calibration; squat and jump gating disabled");
        self.start();
    }

    /// Fold this tick's events into the totals.
    ///
    /// Returns exactly one snapshot per active tick, however many events
    /// arrived.
    pub fn tick(&mut self, dt: f32, events: &[PipelineEvent]) -> Option<StatsSnapshot> {
        if self.phase != SessionPhase::Active
            && events.iter().any(|e| matches!(e, PipelineEvent::CalibrationComplete { .. }))
            && self.phase != SessionPhase::Ended
        {
            self.start();
        }
        if self.phase != SessionPhase::Active {
            return None;
        }

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for event in events {
            match *event {
                PipelineEvent::RunIntensity { intensity } if intensity.is_finite() => {
                    self.stats.distance +=
                        intensity.clamp(0.0, 1.0) * self.config.distance_per_intensity_second * dt;
                }
                PipelineEvent::JumpDetected { .. } => self.stats.jumps += 1,
                PipelineEvent::SquatCompleted { .. } => self.stats.squats += 1,
                _ => {}
            }
        }
        self.stats.elapsed += dt;

        Some(self.snapshot())
    }

    /// Freeze the totals. A later `begin_waiting` or `start` opens a new session.
    pub fn end(&mut self) -> StatsSnapshot {
        if self.phase == SessionPhase::Active {
            log::info!(
                "Session ended: {:.1} m, {} jumps, {} squats in {:.1} s",
                self.stats.distance,
                self.stats.jumps,
                self.stats.squats,
                self.stats.elapsed
            );
        }
        self.phase = SessionPhase::Ended;
        self.snapshot()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let s = &self.stats;
        let cfg = &self.config;
        let distance_progress = if cfg.target_distance > 0.0 {
            (s.distance / cfg.target_distance).clamp(0.0, 1.0)
        } else {
            1.0
        };
        StatsSnapshot {
            distance: s.distance,
            jumps: s.jumps,
            squats: s.squats,
            elapsed: s.elapsed,
            distance_progress,
            distance_goal_met: s.distance >= cfg.target_distance,
            jump_goal_met: s.jumps >= cfg.goal_jumps,
            squat_goal_met: s.squats >= cfg.goal_squats,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
