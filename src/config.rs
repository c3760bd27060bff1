//! Static pipeline configuration
//!
//! Built once at session start, validated, then handed to each component
//! by reference. Every section deserializes with defaults so a JSON file
//! only needs the fields it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{non_negative, positive, unit_range, ConfigError, ConfigResult};

// ─── Calibration ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seconds to wait after session start before sampling the baseline.
    pub settle_delay: f32,
    /// Added to the sampled head height (metres).
    pub height_offset: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { settle_delay: 3.0, height_offset: 0.08 }
    }
}

// ─── Run analyzer ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Head-bob speed (m/s) below which the player counts as idle.
    pub min_velocity: f32,
    /// Head speed (m/s) at or above which motion is treated as a jump in progress.
    pub max_jump_velocity: f32,
    /// Velocity to intensity gain.
    pub sensitivity: f32,
    /// Exponential smoothing rate (1/s).
    pub smooth_factor: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_velocity: 0.15,
            max_jump_velocity: 1.5,
            sensitivity: 1.25,
            smooth_factor: 5.0,
        }
    }
}

// ─── Jump analyzer ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    /// Upward head speed (m/s) that must be strictly exceeded.
    pub velocity_threshold: f32,
    /// Refractory period after a jump (s).
    pub cooldown: f32,
    /// Spikes starting lower than `base_height - min_height_offset` are squat recoveries.
    pub min_height_offset: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self { velocity_threshold: 1.5, cooldown: 0.8, min_height_offset: 0.15 }
    }
}

// ─── Squat analyzer ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquatConfig {
    /// Drop below baseline (m) that enters the squat.
    pub down_threshold: f32,
    /// Drop below baseline (m) that must be cleared to stand up again.
    pub up_threshold: f32,
}

impl Default for SquatConfig {
    fn default() -> Self {
        Self { down_threshold: 0.30, up_threshold: 0.10 }
    }
}

impl SquatConfig {
    pub fn band_width(&self) -> f32 {
        self.down_threshold - self.up_threshold
    }
}

// ─── Locomotion ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    pub run_speed: f32,
    pub crouch_speed: f32,
    /// Deceleration smoothing rate (1/s). Acceleration is instant.
    pub momentum_decay: f32,
    /// Run intensity at or below this is treated as no input.
    pub input_noise_threshold: f32,
    /// Continuous running time (s) before speed is banked for jumps.
    pub min_run_sustain: f32,
    /// How long (s) banked run speed stays eligible to carry into a jump.
    pub jump_memory_window: f32,
    pub jump_force: f32,
    pub gravity: f32,
    /// Fraction of takeoff speed kept while airborne.
    pub air_control: f32,
    pub ground_level: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            run_speed: 8.0,
            crouch_speed: 1.5,
            momentum_decay: 6.0,
            input_noise_threshold: 0.1,
            min_run_sustain: 0.25,
            jump_memory_window: 0.5,
            jump_force: 5.0,
            gravity: 20.0,
            air_control: 1.0,
            ground_level: 0.0,
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Score metres per second of running at full intensity.
    pub distance_per_intensity_second: f32,
    /// Start anyway (with a warning) if calibration has not completed by then.
    pub calibration_timeout: Option<f32>,
    pub target_distance: f32,
    pub goal_jumps: u32,
    pub goal_squats: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            distance_per_intensity_second: 8.0,
            calibration_timeout: Some(10.0),
            target_distance: 100.0,
            goal_jumps: 10,
            goal_squats: 5,
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: CalibrationConfig,
    pub run: RunConfig,
    pub jump: JumpConfig,
    pub squat: SquatConfig,
    pub locomotion: LocomotionConfig,
    pub session: SessionConfig,
    /// Longer ticks are clamped to this (s).
    pub max_tick_dt: f32,
    /// Consecutive sample-less ticks before the source is reported unhealthy.
    pub missing_sample_warn_ticks: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            run: RunConfig::default(),
            jump: JumpConfig::default(),
            squat: SquatConfig::default(),
            locomotion: LocomotionConfig::default(),
            session: SessionConfig::default(),
            max_tick_dt: 0.25,
            missing_sample_warn_ticks: 30,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject configurations that would make the per-tick loop degenerate.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.calibration;
        non_negative("calibration.settle_delay", c.settle_delay)?;
        if !c.height_offset.is_finite() {
            return Err(ConfigError::Negative { field: "calibration.height_offset", value: c.height_offset });
        }

        let r = &self.run;
        non_negative("run.min_velocity", r.min_velocity)?;
        positive("run.max_jump_velocity", r.max_jump_velocity)?;
        if r.min_velocity >= r.max_jump_velocity {
            return Err(ConfigError::InvertedRunBand { min: r.min_velocity, max: r.max_jump_velocity });
        }
        positive("run.sensitivity", r.sensitivity)?;
        positive("run.smooth_factor", r.smooth_factor)?;

        let j = &self.jump;
        positive("jump.velocity_threshold", j.velocity_threshold)?;
        non_negative("jump.cooldown", j.cooldown)?;
        non_negative("jump.min_height_offset", j.min_height_offset)?;

        let s = &self.squat;
        non_negative("squat.up_threshold", s.up_threshold)?;
        positive("squat.down_threshold", s.down_threshold)?;
        if s.band_width() <= 0.0 {
            return Err(ConfigError::EmptyHysteresisBand { down: s.down_threshold, up: s.up_threshold });
        }

        let l = &self.locomotion;
        positive("locomotion.run_speed", l.run_speed)?;
        non_negative("locomotion.crouch_speed", l.crouch_speed)?;
        positive("locomotion.momentum_decay", l.momentum_decay)?;
        unit_range("locomotion.input_noise_threshold", l.input_noise_threshold)?;
        non_negative("locomotion.min_run_sustain", l.min_run_sustain)?;
        non_negative("locomotion.jump_memory_window", l.jump_memory_window)?;
        positive("locomotion.jump_force", l.jump_force)?;
        positive("locomotion.gravity", l.gravity)?;
        unit_range("locomotion.air_control", l.air_control)?;
        if !l.ground_level.is_finite() {
            return Err(ConfigError::Negative { field: "locomotion.ground_level", value: l.ground_level });
        }

        let se = &self.session;
        non_negative("session.distance_per_intensity_second", se.distance_per_intensity_second)?;
        if let Some(timeout) = se.calibration_timeout {
            positive("session.calibration_timeout", timeout)?;
        }
        non_negative("session.target_distance", se.target_distance)?;

        positive("max_tick_dt", self.max_tick_dt)?;
        if self.missing_sample_warn_ticks == 0 {
            return Err(ConfigError::NotPositive { field: "missing_sample_warn_ticks", value: 0.0 });
        }
        Ok(())
    }
}
