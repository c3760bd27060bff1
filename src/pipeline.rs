// pipeline.rs: the per-tick gameplay pipeline
//
// Owns every component and runs them in a fixed order for each tick:
//   Calibration → Run → Jump → Squat → Locomotion → Session
// Nothing here touches tokio, files or visualization, so the same code runs
// under the live loop, the replay tool and unit tests.

use crate::analyzers::{JumpAnalyzer, JumpState, RunAnalyzer, RunState, SquatAnalyzer, SquatState, SquatTransition};
use crate::calibration::{Calibration, CalibrationState};
use crate::config::PipelineConfig;
use crate::error::ConfigResult;
use crate::events::{EventSink, PipelineEvent};
use crate::health_monitor::{HealthReport, SourceHealth};
use crate::locomotion::{Displacement, LocomotionEngine, LocomotionState};
use crate::session::{SessionAggregator, SessionPhase, StatsSnapshot};
use crate::types::{LandmarkSample, Vec3};

// ─── Tick output ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Everything emitted this tick, in pipeline order. Includes the stats
    /// event when a session is active.
    pub events: Vec<PipelineEvent>,
    pub displacement: Displacement,
    pub stats: Option<StatsSnapshot>,
    pub source_healthy: bool,
}

impl TickReport {
    fn skipped(source_healthy: bool) -> Self {
        Self {
            events: Vec::new(),
            displacement: Displacement::default(),
            stats: None,
            source_healthy,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name() == name)
    }
}

/// Read-only view of every component, for status output and visualization.
#[derive(Clone, Debug)]
pub struct PipelineSnapshot {
    pub clock: f64,
    pub calibration: CalibrationState,
    pub run: RunState,
    pub jump: JumpState,
    pub squat: SquatState,
    pub locomotion: LocomotionState,
    pub session_phase: SessionPhase,
    pub stats: StatsSnapshot,
    pub source: HealthReport,
}

// ─── The pipeline ────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: PipelineConfig,

    calibration: Calibration,
    run: RunAnalyzer,
    jump: JumpAnalyzer,
    squat: SquatAnalyzer,
    locomotion: LocomotionEngine,
    session: SessionAggregator,
    source_health: SourceHealth,

    sink: Option<Box<dyn EventSink + Send>>,
    /// Raised between ticks (manual calibration); delivered with the next tick.
    pending: Vec<PipelineEvent>,
    /// Time since `start_session` while still waiting for a baseline.
    waiting_for_calibration: Option<f32>,
    clock: f64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            calibration: Calibration::new(&config.calibration),
            run: RunAnalyzer::new(&config.run),
            jump: JumpAnalyzer::new(&config.jump),
            squat: SquatAnalyzer::new(&config.squat),
            locomotion: LocomotionEngine::new(&config.locomotion),
            session: SessionAggregator::new(&config.session),
            source_health: SourceHealth::new("Landmarks", config.missing_sample_warn_ticks),
            sink: None,
            pending: Vec::new(),
            waiting_for_calibration: None,
            clock: 0.0,
            config,
        })
    }

    pub fn with_sink(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn EventSink + Send>>) {
        self.sink = sink;
    }

    // ── Session control ──────────────────────────────────────────────────

    /// Begin a session. Accumulation starts once calibration completes,
    /// or immediately if a baseline is already known.
    pub fn start_session(&mut self) {
        if self.calibration.is_calibrated() {
            self.waiting_for_calibration = None;
            self.session.start();
            return;
        }
        self.calibration.start_session();
        self.session.begin_waiting();
        self.waiting_for_calibration = Some(0.0);
    }

    /// Calibrate from `sample` right away. The completion event is
    /// delivered with the next tick's report.
    pub fn calibrate_now(&mut self, sample: Option<&LandmarkSample>) -> bool {
        match self.calibration.calibrate_now(sample) {
            Some(done) => {
                self.pending.push(PipelineEvent::CalibrationComplete { base_height: done.base_height });
                true
            }
            None => false,
        }
    }

    pub fn start_without_calibration(&mut self) {
        self.waiting_for_calibration = None;
        self.session.start_without_calibration();
    }

    pub fn end_session(&mut self) -> StatsSnapshot {
        self.waiting_for_calibration = None;
        self.session.end()
    }

    /// End the session, then release the event sink before the components.
    pub fn shutdown(mut self) -> StatsSnapshot {
        let stats = self.end_session();
        drop(self.sink.take());
        log::info!("Pipeline shut down after {:.1}s", self.clock);
        stats
    }

    // ── Per-tick processing ──────────────────────────────────────────────

    pub fn tick(&mut self, sample: Option<&LandmarkSample>, dt: f32) -> TickReport {
        self.tick_with_forward(sample, dt, None)
    }

    /// One pipeline step. `forward` is the player's facing; the last valid
    /// heading is kept when it is absent or degenerate.
    pub fn tick_with_forward(
        &mut self,
        sample: Option<&LandmarkSample>,
        dt: f32,
        forward: Option<Vec3>,
    ) -> TickReport {
        if !(dt.is_finite() && dt > 0.0) {
            log::warn!("Skipping tick with invalid dt {}", dt);
            return TickReport::skipped(self.source_health.is_healthy());
        }
        let dt = if dt > self.config.max_tick_dt {
            log::debug!("Clamping tick dt {:.3}s to {:.3}s", dt, self.config.max_tick_dt);
            self.config.max_tick_dt
        } else {
            dt
        };
        self.clock += dt as f64;

        let sample = sample.filter(|s| s.is_finite());
        let source_healthy = self.source_health.record(sample.is_some());
        let mut events = std::mem::take(&mut self.pending);

        // Calibration
        if let Some(done) = self.calibration.tick(sample, dt) {
            events.push(PipelineEvent::CalibrationComplete { base_height: done.base_height });
        }
        let calibration = self.calibration.state();
        self.check_calibration_timeout(dt, calibration.is_calibrated);

        // Analyzers
        if let Some(intensity) = self.run.tick(sample, dt) {
            events.push(PipelineEvent::RunIntensity { intensity });
        }
        if let Some(jump) = self.jump.tick(sample, dt, calibration) {
            events.push(PipelineEvent::JumpDetected { count: jump.count });
        }
        match self.squat.tick(sample, calibration) {
            Some(SquatTransition::Entered) => {
                events.push(PipelineEvent::SquatStateChanged { squatting: true });
            }
            Some(SquatTransition::Completed { squat_count }) => {
                events.push(PipelineEvent::SquatStateChanged { squatting: false });
                events.push(PipelineEvent::SquatCompleted { count: squat_count });
            }
            None => {}
        }

        // Locomotion and aggregation see this tick's events
        let displacement = self.locomotion.tick(dt, forward, &events);
        let stats = self.session.tick(dt, &events);
        if let Some(ref snapshot) = stats {
            events.push(PipelineEvent::Stats(snapshot.clone()));
        }

        if let Some(sink) = self.sink.as_mut() {
            for event in &events {
                sink.publish(event);
            }
        }

        TickReport { events, displacement, stats, source_healthy }
    }

    fn check_calibration_timeout(&mut self, dt: f32, calibrated: bool) {
        let Some(waited) = self.waiting_for_calibration else { return };
        if calibrated {
            self.waiting_for_calibration = None;
            return;
        }
        let waited = waited + dt;
        match self.config.session.calibration_timeout {
            Some(timeout) if waited >= timeout => {
                log::warn!("No calibration after {:.1}s", waited);
                self.start_without_calibration();
            }
            _ => self.waiting_for_calibration = Some(waited),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn get_snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            clock: self.clock,
            calibration: self.calibration.state(),
            run: self.run.state(),
            jump: self.jump.state(),
            squat: self.squat.state(),
            locomotion: self.locomotion.state(),
            session_phase: self.session.phase(),
            stats: self.session.snapshot(),
            source: self.source_health.check_health(),
        }
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration.state()
    }

    /// Head height relative to the calibrated baseline.
    pub fn height_delta(&self, head_y: f32) -> Option<f32> {
        self.calibration.height_delta(head_y)
    }

    pub fn is_squatting(&self) -> bool {
        self.squat.is_squatting()
    }

    pub fn run_factor(&self) -> f32 {
        self.run.run_factor()
    }

    pub fn locomotion_state(&self) -> LocomotionState {
        self.locomotion.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.session.snapshot()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn source_status(&self) -> String {
        self.source_health.format_status()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn calibrated_pipeline(height: f32) -> Pipeline {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start_session();
        assert!(pipeline.calibrate_now(Some(&LandmarkSample::standing_at(height - 0.08))));
        pipeline
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.squat.up_threshold = 0.5;
        assert!(matches!(
            Pipeline::new(config),
            Err(ConfigError::EmptyHysteresisBand { .. })
        ));
    }

    #[test]
    fn test_settle_delay_calibrates_and_starts_session() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.start_session();
        let sample = LandmarkSample::standing_at(1.62);

        let mut completed = 0;
        for _ in 0..200 {
            let report = pipeline.tick(Some(&sample), DT);
            if report.has("calibration_complete") {
                completed += 1;
                assert!(report.stats.is_some());
            }
        }
        assert_eq!(completed, 1);
        assert_relative_eq!(pipeline.calibration_state().base_height, 1.70, epsilon = 1e-5);
        assert_eq!(pipeline.session_phase(), SessionPhase::Active);
    }

    #[test]
    fn test_manual_calibration_delivered_next_tick() {
        let mut pipeline = calibrated_pipeline(1.80);
        let report = pipeline.tick(Some(&LandmarkSample::standing_at(1.72)), DT);
        match report.events[0] {
            PipelineEvent::CalibrationComplete { base_height } => assert_relative_eq!(base_height, 1.80, epsilon = 1e-5),
            ref other => panic!("expected calibration first, got {:?}", other),
        }
        assert!(report.stats.is_some());
    }

    #[test]
    fn test_calibration_timeout_starts_session() {
        let mut config = PipelineConfig::default();
        config.session.calibration_timeout = Some(1.0);
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.start_session();

        // no samples at all: calibration fails at expiry, the timeout still fires
        for _ in 0..59 {
            assert!(pipeline.tick(None, DT).stats.is_none());
        }
        let mut started = false;
        for _ in 0..5 {
            started |= pipeline.tick(None, DT).stats.is_some();
        }
        assert!(started);
        assert!(!pipeline.calibration_state().is_calibrated);
    }

    #[test]
    fn test_invalid_dt_skips_tick() {
        let mut pipeline = calibrated_pipeline(1.80);
        let sample = LandmarkSample::standing_at(1.72);
        pipeline.tick(Some(&sample), DT);
        let before = pipeline.stats();

        for dt in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let report = pipeline.tick(Some(&sample), dt);
            assert!(report.events.is_empty());
            assert_eq!(report.displacement, Displacement::default());
        }
        assert_eq!(pipeline.stats(), before);
    }

    #[test]
    fn test_large_dt_clamped() {
        let mut pipeline = calibrated_pipeline(1.80);
        let report = pipeline.tick(Some(&LandmarkSample::standing_at(1.72)), 5.0);
        assert_relative_eq!(report.stats.unwrap().elapsed, 0.25);
    }

    #[test]
    fn test_squat_rep_reaches_stats() {
        let mut pipeline = calibrated_pipeline(1.80);
        let heights = [1.72, 1.60, 1.45, 1.45, 1.65, 1.75, 1.72];
        let mut squat_events = Vec::new();
        for h in heights {
            let report = pipeline.tick(Some(&LandmarkSample::standing_at(h)), 0.5);
            squat_events.extend(report.events.into_iter().filter(|e| {
                matches!(e, PipelineEvent::SquatStateChanged { .. } | PipelineEvent::SquatCompleted { .. })
            }));
        }
        assert_eq!(
            squat_events,
            vec![
                PipelineEvent::SquatStateChanged { squatting: true },
                PipelineEvent::SquatStateChanged { squatting: false },
                PipelineEvent::SquatCompleted { count: 1 },
            ]
        );
        assert_eq!(pipeline.stats().squats, 1);
    }

    #[test]
    fn test_missing_samples_flag_source() {
        let mut config = PipelineConfig::default();
        config.missing_sample_warn_ticks = 3;
        let mut pipeline = Pipeline::new(config).unwrap();
        let mut bad = LandmarkSample::standing_at(1.7);
        bad.left_hand.x = f32::NAN;

        assert!(pipeline.tick(None, DT).source_healthy);
        assert!(pipeline.tick(Some(&bad), DT).source_healthy);
        assert!(!pipeline.tick(None, DT).source_healthy);
        assert!(pipeline.tick(Some(&LandmarkSample::standing_at(1.7)), DT).source_healthy);
    }

    #[test]
    fn test_stand_up_during_tracking_gap_is_not_a_jump() {
        let mut pipeline = calibrated_pipeline(1.78);
        for _ in 0..10 {
            pipeline.tick(Some(&LandmarkSample::standing_at(1.58)), DT);
        }
        for _ in 0..15 {
            pipeline.tick(None, DT);
        }
        let report = pipeline.tick(Some(&LandmarkSample::standing_at(1.78)), DT);

        assert!(!report.has("jump"));
        assert_eq!(pipeline.stats().jumps, 0);
        assert!(pipeline.locomotion_state().grounded);
    }

    #[test]
    fn test_tracking_gap_stops_avatar_and_distance_together() {
        let mut pipeline = calibrated_pipeline(1.80);
        let mut y = 1.80;
        for i in 0..90 {
            y += if i % 2 == 0 { 0.6 * DT } else { -0.6 * DT };
            pipeline.tick(Some(&LandmarkSample::standing_at(y)), DT);
        }
        assert!(pipeline.run_factor() > 0.5);
        let distance_before = pipeline.stats().distance;

        let mut moved = 0.0;
        for _ in 0..300 {
            moved += pipeline.tick(None, DT).displacement.horizontal.norm();
        }
        let grew = pipeline.stats().distance - distance_before;

        // both wind down from the same decaying intensity; the avatar
        // coasts a little further on momentum
        assert_eq!(pipeline.run_factor(), 0.0);
        assert_eq!(pipeline.locomotion_state().current_speed, 0.0);
        assert!(grew > 1.0 && grew < 1.5, "counted {}", grew);
        assert!(moved >= grew && moved < 3.0, "moved {} vs counted {}", moved, grew);

        // a longer gap changes neither
        let distance_after = pipeline.stats().distance;
        for _ in 0..300 {
            assert_eq!(pipeline.tick(None, DT).displacement.horizontal_speed, 0.0);
        }
        assert_eq!(pipeline.stats().distance, distance_after);
    }

    #[test]
    fn test_sink_receives_events_and_is_dropped_on_shutdown() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap().with_sink(tx);
        pipeline.start_session();
        pipeline.calibrate_now(Some(&LandmarkSample::standing_at(1.7)));
        let report = pipeline.tick(Some(&LandmarkSample::standing_at(1.7)), DT);

        let received: Vec<PipelineEvent> = rx.try_iter().collect();
        assert_eq!(received, report.events);

        let stats = pipeline.shutdown();
        assert_relative_eq!(stats.elapsed, DT);
        assert!(rx.recv().is_err());
    }
}
