//! Momentum locomotion
//!
//! Turns the analyzer event stream into a per-tick displacement. Speed rises
//! instantly to a higher target and coasts down exponentially. Sustained
//! running banks a takeoff speed that a jump may reuse for a short memory
//! window; a jump outside that window is a standing jump and stays
//! horizontally locked until landing.

use crate::config::LocomotionConfig;
use crate::events::PipelineEvent;
use crate::smoothing::{blend_weight, lerp};
use crate::types::{default_forward, flatten_horizontal, up, Vec3};

/// Coasting speeds this close to the target snap onto it.
const SPEED_SNAP: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocomotionState {
    pub current_speed: f32,
    pub vertical_velocity: f32,
    /// Vertical position; equals ground level whenever grounded.
    pub height: f32,
    pub grounded: bool,
    pub stationary_jump_lock: bool,
    pub stored_run_speed: f32,
    /// Engine clock time at which run speed was last banked.
    pub last_valid_run_time: Option<f32>,
    pub momentum_run_duration: f32,
}

/// Movement produced by one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Displacement {
    pub horizontal: Vec3,
    pub vertical: f32,
    pub horizontal_speed: f32,
}

impl Default for Displacement {
    fn default() -> Self {
        Self { horizontal: Vec3::zeros(), vertical: 0.0, horizontal_speed: 0.0 }
    }
}

impl Displacement {
    pub fn total(&self) -> Vec3 {
        self.horizontal + up() * self.vertical
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JumpOutcome {
    /// Banked run speed carried into the air.
    Running { takeoff_speed: f32 },
    /// No recent running; horizontal motion locked until landing.
    Standing,
    BlockedAirborne,
    BlockedSquatting,
}

pub struct LocomotionEngine {
    config: LocomotionConfig,
    state: LocomotionState,
    clock: f32,
    run_intensity: f32,
    squatting: bool,
    forward: Vec3,
}

impl LocomotionEngine {
    pub fn new(config: &LocomotionConfig) -> Self {
        Self {
            state: LocomotionState {
                current_speed: 0.0,
                vertical_velocity: 0.0,
                height: config.ground_level,
                grounded: true,
                stationary_jump_lock: false,
                stored_run_speed: 0.0,
                last_valid_run_time: None,
                momentum_run_duration: 0.0,
            },
            config: config.clone(),
            clock: 0.0,
            run_intensity: 0.0,
            squatting: false,
            forward: default_forward(),
        }
    }

    /// Advance one tick.
    ///
    /// `inputs` are this tick's analyzer events; they are applied after the
    /// clock advances and before motion is integrated, so a jump detected
    /// this tick takes off this tick. `forward` is the facing direction;
    /// only its horizontal part is used.
    pub fn tick(&mut self, dt: f32, forward: Option<Vec3>, inputs: &[PipelineEvent]) -> Displacement {
        if !(dt.is_finite() && dt > 0.0) {
            return Displacement::default();
        }
        self.clock += dt;
        if let Some(flat) = forward.as_ref().and_then(flatten_horizontal) {
            self.forward = flat;
        }
        for event in inputs {
            self.observe(event);
        }

        if self.state.grounded {
            self.update_ground_speed(dt);
        }
        let horizontal_speed = self.horizontal_speed();
        let vertical = self.integrate_vertical(dt);

        Displacement {
            horizontal: self.forward * horizontal_speed * dt,
            vertical,
            horizontal_speed,
        }
    }

    /// Apply one analyzer event. Only jumps produce an outcome.
    pub fn observe(&mut self, event: &PipelineEvent) -> Option<JumpOutcome> {
        match *event {
            PipelineEvent::RunIntensity { intensity } => {
                self.run_intensity = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
                None
            }
            PipelineEvent::SquatStateChanged { squatting } => {
                self.squatting = squatting;
                None
            }
            PipelineEvent::JumpDetected { .. } => Some(self.handle_jump()),
            _ => None,
        }
    }

    pub fn handle_jump(&mut self) -> JumpOutcome {
        if !self.state.grounded {
            return JumpOutcome::BlockedAirborne;
        }
        if self.squatting {
            return JumpOutcome::BlockedSquatting;
        }

        let window = self.config.jump_memory_window;
        let recently_ran = self
            .state
            .last_valid_run_time
            .map(|t| self.clock - t <= window)
            .unwrap_or(false);

        let outcome = if recently_ran {
            self.state.current_speed = self.state.current_speed.max(self.state.stored_run_speed);
            self.state.stationary_jump_lock = false;
            JumpOutcome::Running { takeoff_speed: self.state.current_speed }
        } else {
            self.state.current_speed = 0.0;
            self.state.stored_run_speed = 0.0;
            self.state.stationary_jump_lock = true;
            JumpOutcome::Standing
        };

        self.state.vertical_velocity = self.config.jump_force;
        self.state.grounded = false;
        log::debug!("Takeoff: {:?}", outcome);
        outcome
    }

    pub fn horizontal_speed(&self) -> f32 {
        if self.state.grounded {
            self.state.current_speed
        } else if self.state.stationary_jump_lock {
            0.0
        } else {
            self.state.current_speed * self.config.air_control
        }
    }

    pub fn state(&self) -> LocomotionState {
        self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.state.grounded
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    fn update_ground_speed(&mut self, dt: f32) {
        let cfg = &self.config;
        let intensity = self.run_intensity;
        let moving = intensity > cfg.input_noise_threshold;

        let target = if self.squatting {
            self.state.momentum_run_duration = 0.0;
            if moving { cfg.crouch_speed } else { 0.0 }
        } else if moving {
            self.state.momentum_run_duration += dt;
            if self.state.momentum_run_duration > cfg.min_run_sustain {
                self.state.stored_run_speed = cfg.run_speed * intensity;
                self.state.last_valid_run_time = Some(self.clock);
            }
            cfg.run_speed * intensity
        } else {
            self.state.momentum_run_duration = 0.0;
            0.0
        };

        let current = self.state.current_speed;
        self.state.current_speed = if target >= current {
            target
        } else {
            let coasted = lerp(current, target, blend_weight(cfg.momentum_decay, dt));
            if coasted - target < SPEED_SNAP { target } else { coasted }
        };
    }

    /// Returns the vertical displacement of this tick.
    fn integrate_vertical(&mut self, dt: f32) -> f32 {
        let ground = self.config.ground_level;
        if self.state.grounded {
            self.state.vertical_velocity = 0.0;
            self.state.height = ground;
            return 0.0;
        }

        let previous = self.state.height;
        self.state.vertical_velocity -= self.config.gravity * dt;
        let next = previous + self.state.vertical_velocity * dt;

        if next <= ground {
            self.state.height = ground;
            self.state.grounded = true;
            self.state.vertical_velocity = 0.0;
            self.state.stationary_jump_lock = false;
        } else {
            self.state.height = next;
        }
        self.state.height - previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn engine() -> LocomotionEngine {
        LocomotionEngine::new(&LocomotionConfig::default())
    }

    fn run(intensity: f32) -> PipelineEvent {
        PipelineEvent::RunIntensity { intensity }
    }

    fn jump() -> PipelineEvent {
        PipelineEvent::JumpDetected { count: 1 }
    }

    fn ticks(engine: &mut LocomotionEngine, n: usize, inputs: &[PipelineEvent]) -> Vec<Displacement> {
        (0..n).map(|_| engine.tick(DT, None, inputs)).collect()
    }

    #[test]
    fn test_idle_is_stationary() {
        let mut engine = engine();
        for d in ticks(&mut engine, 120, &[]) {
            assert_eq!(d.total(), Vec3::zeros());
        }
        assert!(engine.is_grounded());
    }

    #[test]
    fn test_instant_acceleration_gradual_coast() {
        let mut engine = engine();
        let d = engine.tick(DT, None, &[run(0.5)]);
        assert_relative_eq!(d.horizontal_speed, 4.0);

        let d = engine.tick(DT, None, &[run(0.0)]);
        assert!(d.horizontal_speed < 4.0 && d.horizontal_speed > 3.0);

        ticks(&mut engine, 300, &[]);
        assert_eq!(engine.state().current_speed, 0.0);
    }

    #[test]
    fn test_squat_caps_at_crouch_speed() {
        let mut engine = engine();
        engine.tick(DT, None, &[PipelineEvent::SquatStateChanged { squatting: true }, run(1.0)]);
        let d = engine.tick(DT, None, &[run(1.0)]);
        assert_relative_eq!(d.horizontal_speed, 1.5);

        engine.tick(DT, None, &[run(0.05)]);
        ticks(&mut engine, 300, &[]);
        assert_eq!(engine.state().current_speed, 0.0);
    }

    #[test]
    fn test_running_jump_carries_banked_speed() {
        let mut engine = engine();
        ticks(&mut engine, 60, &[run(0.8)]);
        assert_relative_eq!(engine.state().stored_run_speed, 6.4, epsilon = 1e-4);

        // stop; speed coasts down while the memory window is still open
        engine.tick(DT, None, &[run(0.0)]);
        ticks(&mut engine, 11, &[]);
        assert!(engine.state().current_speed < 6.4);

        let d = engine.tick(DT, None, &[jump()]);
        assert!(!engine.is_grounded());
        assert_relative_eq!(d.horizontal_speed, 6.4, epsilon = 1e-4);

        // speed is frozen for the rest of the flight
        let d = engine.tick(DT, None, &[]);
        assert_relative_eq!(d.horizontal_speed, 6.4, epsilon = 1e-4);
    }

    #[test]
    fn test_standing_jump_locks_horizontal() {
        let mut engine = engine();
        ticks(&mut engine, 60, &[run(0.8)]);
        engine.tick(DT, None, &[run(0.0)]);
        ticks(&mut engine, 60, &[]);

        assert_eq!(engine.handle_jump(), JumpOutcome::Standing);
        assert!(engine.state().stationary_jump_lock);

        let mut airborne_ticks = 0;
        while !engine.is_grounded() {
            let d = engine.tick(DT, None, &[run(1.0)]);
            assert_eq!(d.horizontal_speed, 0.0);
            assert_eq!(d.horizontal, Vec3::zeros());
            airborne_ticks += 1;
            assert!(airborne_ticks < 120);
        }
        assert!(!engine.state().stationary_jump_lock);
    }

    #[test]
    fn test_jump_blocked_while_squatting_or_airborne() {
        let mut engine = engine();
        engine.observe(&PipelineEvent::SquatStateChanged { squatting: true });
        assert_eq!(engine.handle_jump(), JumpOutcome::BlockedSquatting);
        assert!(engine.is_grounded());

        engine.observe(&PipelineEvent::SquatStateChanged { squatting: false });
        engine.handle_jump();
        assert_eq!(engine.handle_jump(), JumpOutcome::BlockedAirborne);
    }

    #[test]
    fn test_large_tick_lands_on_ground() {
        let mut engine = engine();
        engine.handle_jump();
        let d = engine.tick(10.0, None, &[]);

        let state = engine.state();
        assert!(state.grounded);
        assert_eq!(state.vertical_velocity, 0.0);
        assert_eq!(state.height, 0.0);
        assert_eq!(d.vertical, 0.0);
    }

    #[test]
    fn test_flight_returns_to_ground_exactly() {
        let mut engine = engine();
        engine.handle_jump();
        let mut net = 0.0;
        let mut peak: f32 = 0.0;
        while !engine.is_grounded() {
            net += engine.tick(DT, None, &[]).vertical;
            peak = peak.max(engine.state().height);
            assert!(engine.state().height >= 0.0);
        }
        // v^2 / 2g = 25 / 40
        assert_relative_eq!(peak, 0.625, epsilon = 0.05);
        assert_relative_eq!(net, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_forward_is_flattened() {
        let mut engine = engine();
        let d = engine.tick(DT, Some(Vec3::new(1.0, -1.0, 0.0)), &[run(0.5)]);
        assert_relative_eq!(d.horizontal.x, 4.0 * DT, epsilon = 1e-6);
        assert_eq!(d.horizontal.y, 0.0);

        // looking straight down keeps the last heading
        let d = engine.tick(DT, Some(Vec3::new(0.0, -1.0, 0.0)), &[run(0.5)]);
        assert!(d.horizontal.x > 0.0);
    }

    #[test]
    fn test_bad_dt_is_ignored() {
        let mut engine = engine();
        engine.tick(DT, None, &[run(0.5)]);
        let before = engine.state();
        assert_eq!(engine.tick(f32::NAN, None, &[jump()]), Displacement::default());
        assert_eq!(engine.tick(0.0, None, &[]), Displacement::default());
        assert_eq!(engine.state(), before);
    }
}
