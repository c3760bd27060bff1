//! Squat state machine with a hysteresis band
//!
//! Enter below `base - down_threshold`, leave above `base - up_threshold`.
//! The gap between the two lines keeps a head hovering at either boundary
//! from toggling the state every tick.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationState;
use crate::config::SquatConfig;
use crate::types::LandmarkSample;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquatPhase {
    #[default]
    Standing,
    Squatting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SquatState {
    pub phase: SquatPhase,
    pub squat_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquatTransition {
    /// Head dropped below the down line.
    Entered,
    /// Head rose back above the up line; one rep done.
    Completed { squat_count: u32 },
}

pub struct SquatAnalyzer {
    down_threshold: f32,
    up_threshold: f32,
    phase: SquatPhase,
    squat_count: u32,
}

impl SquatAnalyzer {
    /// Thresholds are assumed validated (`down_threshold > up_threshold`).
    pub fn new(config: &SquatConfig) -> Self {
        Self {
            down_threshold: config.down_threshold,
            up_threshold: config.up_threshold,
            phase: SquatPhase::Standing,
            squat_count: 0,
        }
    }

    pub fn tick(
        &mut self,
        sample: Option<&LandmarkSample>,
        calibration: CalibrationState,
    ) -> Option<SquatTransition> {
        let sample = sample.filter(|s| s.is_finite())?;
        if !calibration.is_calibrated {
            return None;
        }
        let head_y = sample.head_y();

        match self.phase {
            SquatPhase::Standing if head_y < calibration.base_height - self.down_threshold => {
                self.phase = SquatPhase::Squatting;
                Some(SquatTransition::Entered)
            }
            SquatPhase::Squatting if head_y > calibration.base_height - self.up_threshold => {
                self.phase = SquatPhase::Standing;
                self.squat_count += 1;
                log::debug!("Squat completed, total {}", self.squat_count);
                Some(SquatTransition::Completed { squat_count: self.squat_count })
            }
            _ => None,
        }
    }

    pub fn is_squatting(&self) -> bool {
        self.phase == SquatPhase::Squatting
    }

    pub fn state(&self) -> SquatState {
        SquatState { phase: self.phase, squat_count: self.squat_count }
    }

    pub fn reset(&mut self) {
        self.phase = SquatPhase::Standing;
        self.squat_count = 0;
    }
}
