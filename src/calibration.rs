//! Baseline standing head height
//!
//! The settling delay is a countdown advanced by `tick`, so the rest of the
//! pipeline keeps running while the player straightens up.

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::types::LandmarkSample;

/// Read-only view handed to height-relative analyzers each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub base_height: f32,
    pub is_calibrated: bool,
}

impl CalibrationState {
    /// Baseline for a known standing height, mainly for tests and replays.
    pub fn calibrated(base_height: f32) -> Self {
        Self { base_height, is_calibrated: true }
    }

    /// `base_height - offset`, or `None` while uncalibrated.
    pub fn line_below_base(&self, offset: f32) -> Option<f32> {
        self.is_calibrated.then(|| self.base_height - offset)
    }
}

/// Emitted once per session when the baseline is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationComplete {
    pub base_height: f32,
}

pub struct Calibration {
    height_offset: f32,
    settle_delay: f32,
    state: CalibrationState,
    settle_remaining: Option<f32>,
}

impl Calibration {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            height_offset: config.height_offset,
            settle_delay: config.settle_delay,
            state: CalibrationState::default(),
            settle_remaining: None,
        }
    }

    /// Begin the settling countdown. Ignored once calibrated.
    pub fn start_session(&mut self) {
        if self.state.is_calibrated {
            return;
        }
        log::info!(
            "Calibration starting in {:.1}s, stand up straight",
            self.settle_delay
        );
        self.settle_remaining = Some(self.settle_delay);
    }

    /// Advance the countdown; calibrates from `sample` on the tick it expires.
    pub fn tick(&mut self, sample: Option<&LandmarkSample>, dt: f32) -> Option<CalibrationComplete> {
        let remaining = self.settle_remaining? - dt;
        if remaining > 0.0 {
            self.settle_remaining = Some(remaining);
            return None;
        }
        self.settle_remaining = None;
        self.apply(sample)
    }

    /// Manual override: calibrate immediately and cancel any pending countdown.
    pub fn calibrate_now(&mut self, sample: Option<&LandmarkSample>) -> Option<CalibrationComplete> {
        self.settle_remaining = None;
        if self.state.is_calibrated {
            log::debug!("Calibration already complete, keeping baseline {:.2}m", self.state.base_height);
            return None;
        }
        self.apply(sample)
    }

    pub fn reset(&mut self) {
        self.state = CalibrationState::default();
        self.settle_remaining = None;
        log::info!("Calibration reset");
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.is_calibrated
    }

    pub fn is_pending(&self) -> bool {
        self.settle_remaining.is_some()
    }

    /// Head height relative to the baseline.
    pub fn height_delta(&self, head_y: f32) -> Option<f32> {
        self.state.is_calibrated.then(|| head_y - self.state.base_height)
    }

    fn apply(&mut self, sample: Option<&LandmarkSample>) -> Option<CalibrationComplete> {
        let Some(sample) = sample.filter(|s| s.is_finite()) else {
            log::warn!("Calibration failed: no landmark sample available, analyzers stay gated");
            return None;
        };
        let base_height = sample.head_y() + self.height_offset;
        self.state = CalibrationState { base_height, is_calibrated: true };
        log::info!("Calibration complete, baseline head height {:.2}m", base_height);
        Some(CalibrationComplete { base_height })
    }
}
