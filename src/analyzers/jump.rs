//! Jump detection from upward head-velocity spikes

use crate::calibration::CalibrationState;
use crate::config::JumpConfig;
use crate::types::LandmarkSample;

use super::usable_dt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpState {
    pub previous_head_y: Option<f32>,
    pub cooldown_remaining: f32,
    pub jump_count: u32,
}

/// A detected jump takeoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpDetected {
    pub count: u32,
    pub velocity: f32,
}

pub struct JumpAnalyzer {
    velocity_threshold: f32,
    cooldown_time: f32,
    min_height_offset: f32,
    previous_head_y: Option<f32>,
    cooldown_remaining: f32,
    jump_count: u32,
}

impl JumpAnalyzer {
    pub fn new(config: &JumpConfig) -> Self {
        Self {
            velocity_threshold: config.velocity_threshold,
            cooldown_time: config.cooldown,
            min_height_offset: config.min_height_offset,
            previous_head_y: None,
            cooldown_remaining: 0.0,
            jump_count: 0,
        }
    }

    pub fn tick(
        &mut self,
        sample: Option<&LandmarkSample>,
        dt: f32,
        calibration: CalibrationState,
    ) -> Option<JumpDetected> {
        if !usable_dt(dt) {
            return None;
        }
        let Some(sample) = sample.filter(|s| s.is_finite()) else {
            // the next sample only re-primes; a height change across a
            // tracking gap is not a one-tick velocity
            self.previous_head_y = None;
            self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
            return None;
        };
        let head_y = sample.head_y();

        if self.cooldown_remaining > 0.0 {
            self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
            // stale position would read as a spike when the cooldown lapses
            self.previous_head_y = Some(head_y);
            return None;
        }

        let previous = self.previous_head_y.replace(head_y)?;
        let velocity = (head_y - previous) / dt;
        if velocity <= self.velocity_threshold {
            return None;
        }

        if let Some(gate) = calibration.line_below_base(self.min_height_offset) {
            if head_y < gate {
                log::debug!(
                    "Jump rejected: head {:.2}m below gate {:.2}m (squat recovery)",
                    head_y,
                    gate
                );
                return None;
            }
        }

        self.jump_count += 1;
        self.cooldown_remaining = self.cooldown_time;
        log::debug!("Jump detected #{} at {:.2} m/s", self.jump_count, velocity);
        Some(JumpDetected { count: self.jump_count, velocity })
    }

    pub fn state(&self) -> JumpState {
        JumpState {
            previous_head_y: self.previous_head_y,
            cooldown_remaining: self.cooldown_remaining,
            jump_count: self.jump_count,
        }
    }

    pub fn jump_count(&self) -> u32 {
        self.jump_count
    }

    pub fn reset(&mut self) {
        self.previous_head_y = None;
        self.cooldown_remaining = 0.0;
        self.jump_count = 0;
    }
}
