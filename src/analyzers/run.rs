//! Run intensity from vertical head-bob speed

use crate::config::RunConfig;
use crate::smoothing::{clamp01, ExpSmoother};
use crate::types::LandmarkSample;

use super::usable_dt;

/// Smoothed values this close to zero snap to exactly zero.
const ZERO_SNAP: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunState {
    pub run_factor: f32,
    pub previous_head_y: Option<f32>,
}

pub struct RunAnalyzer {
    min_velocity: f32,
    max_jump_velocity: f32,
    sensitivity: f32,
    smoother: ExpSmoother,
    previous_head_y: Option<f32>,
    zero_reported: bool,
}

impl RunAnalyzer {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            min_velocity: config.min_velocity,
            max_jump_velocity: config.max_jump_velocity,
            sensitivity: config.sensitivity,
            smoother: ExpSmoother::new(0.0, config.smooth_factor, ZERO_SNAP),
            previous_head_y: None,
            zero_reported: true,
        }
    }

    /// Returns the run intensity to publish this tick, if any.
    ///
    /// Nonzero intensity is published every tick; zero is published once,
    /// on the tick the factor first settles there.
    ///
    /// A tick without a usable sample re-primes the head position and lets
    /// the factor decay towards zero, so downstream consumers never keep
    /// running on a stale value.
    pub fn tick(&mut self, sample: Option<&LandmarkSample>, dt: f32) -> Option<f32> {
        if !usable_dt(dt) {
            return None;
        }
        let Some(sample) = sample.filter(|s| s.is_finite()) else {
            self.previous_head_y = None;
            let run_factor = self.smoother.step(0.0, dt);
            return self.publish(run_factor);
        };

        let head_y = sample.head_y();
        let Some(previous) = self.previous_head_y.replace(head_y) else {
            // re-prime tick: hold the factor
            return self.publish(self.smoother.value());
        };
        let velocity = (head_y - previous).abs() / dt;

        let target = self.target_for(velocity);
        let run_factor = self.smoother.step(target, dt);
        self.publish(run_factor)
    }

    pub fn run_factor(&self) -> f32 {
        self.smoother.value()
    }

    pub fn state(&self) -> RunState {
        RunState {
            run_factor: self.smoother.value(),
            previous_head_y: self.previous_head_y,
        }
    }

    pub fn reset(&mut self) {
        self.smoother.reset(0.0);
        self.previous_head_y = None;
        self.zero_reported = true;
    }

    fn target_for(&self, velocity: f32) -> f32 {
        if velocity < self.min_velocity {
            // breathing, tracking jitter
            0.0
        } else if velocity >= self.max_jump_velocity {
            // a jump spike must not collapse intensity
            self.smoother.value()
        } else {
            clamp01(velocity * self.sensitivity)
        }
    }

    fn publish(&mut self, run_factor: f32) -> Option<f32> {
        if run_factor > 0.0 {
            self.zero_reported = false;
            Some(run_factor)
        } else if !self.zero_reported {
            self.zero_reported = true;
            Some(0.0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn analyzer() -> RunAnalyzer {
        RunAnalyzer::new(&RunConfig::default())
    }

    /// Head bobbing at `speed` m/s: alternating direction every tick.
    fn bob(analyzer: &mut RunAnalyzer, ticks: usize, speed: f32) -> Vec<f32> {
        let mut y = 1.70;
        let mut out = Vec::new();
        for i in 0..ticks {
            let step = speed * DT;
            y += if i % 2 == 0 { step } else { -step };
            if let Some(v) = analyzer.tick(Some(&LandmarkSample::standing_at(y)), DT) {
                out.push(v);
            }
        }
        out
    }

    #[test]
    fn test_first_sample_only_primes() {
        let mut run = analyzer();
        assert!(run.tick(Some(&LandmarkSample::standing_at(1.7)), DT).is_none());
        assert_eq!(run.state().previous_head_y, Some(1.7));
    }

    #[test]
    fn test_jitter_stays_idle() {
        let mut run = analyzer();
        let events = bob(&mut run, 300, 0.05);
        assert!(events.is_empty());
        assert_eq!(run.run_factor(), 0.0);
    }

    #[test]
    fn test_running_rises_towards_target() {
        let mut run = analyzer();
        bob(&mut run, 120, 0.6);
        // target = 0.6 * 1.25 = 0.75
        assert_relative_eq!(run.run_factor(), 0.75, epsilon = 0.01);
    }

    #[test]
    fn test_bounded_step_per_tick() {
        let mut run = analyzer();
        let events = bob(&mut run, 60, 1.0);
        let max_step = 1.0 - (-5.0f32 * DT).exp();
        let mut previous = 0.0;
        for value in events {
            assert!(value - previous <= max_step + 1e-6);
            previous = value;
        }
    }

    #[test]
    fn test_jump_spike_holds_intensity() {
        let mut run = analyzer();
        bob(&mut run, 120, 0.6);
        let before = run.run_factor();

        let y = run.state().previous_head_y.unwrap();
        let during = run.tick(Some(&LandmarkSample::standing_at(y + 3.0 * DT)), DT).unwrap();

        assert_relative_eq!(during, before, epsilon = 1e-6);
    }

    #[test]
    fn test_single_zero_event_after_stopping() {
        let mut run = analyzer();
        bob(&mut run, 120, 0.6);

        let still = LandmarkSample::standing_at(1.70);
        let mut zeros = 0;
        for _ in 0..600 {
            if run.tick(Some(&still), DT) == Some(0.0) {
                zeros += 1;
            }
        }

        assert_eq!(run.run_factor(), 0.0);
        assert_eq!(zeros, 1);
    }

    #[test]
    fn test_invalid_dt_is_noop() {
        let mut run = analyzer();
        bob(&mut run, 60, 0.6);
        let state = run.state();
        assert!(run.tick(Some(&LandmarkSample::standing_at(1.7)), 0.0).is_none());
        assert!(run.tick(None, f32::NAN).is_none());
        assert_eq!(run.state(), state);
    }

    #[test]
    fn test_missing_samples_decay_and_reprime() {
        let mut run = analyzer();
        bob(&mut run, 120, 0.6);
        let before = run.run_factor();

        let during_gap = run.tick(None, DT).unwrap();
        assert!(during_gap < before);
        assert_eq!(run.state().previous_head_y, None);

        let mut zeros = 0;
        for _ in 0..600 {
            if run.tick(None, DT) == Some(0.0) {
                zeros += 1;
            }
        }
        assert_eq!(zeros, 1);

        // a big height change across the gap only re-primes
        assert!(run.tick(Some(&LandmarkSample::standing_at(1.2)), DT).is_none());
        assert_eq!(run.run_factor(), 0.0);
    }

    #[test]
    fn test_single_dropout_keeps_publishing() {
        let mut run = analyzer();
        bob(&mut run, 120, 0.6);

        let during_gap = run.tick(None, DT).unwrap();
        let reprimed = run.tick(Some(&LandmarkSample::standing_at(1.7)), DT).unwrap();
        assert_eq!(reprimed, during_gap);
        assert!(run.tick(Some(&LandmarkSample::standing_at(1.71)), DT).is_some());
    }
}
