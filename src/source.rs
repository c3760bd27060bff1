//! Landmark sources
//!
//! The tracker that produces real landmarks lives outside this crate. The
//! scripted routine stands in for it in the demo binary and in tests: a
//! player who stands still, runs on the spot, jumps and squats.

use std::f32::consts::PI;

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, Duration};

use crate::live_status::current_timestamp;
use crate::recording::LandmarkFrame;
use crate::types::LandmarkSample;

/// Supplies at most one sample per tick.
pub trait LandmarkSource {
    /// Advance by `dt` seconds. `None` means no player was tracked this tick.
    fn next_sample(&mut self, dt: f32) -> Option<LandmarkSample>;

    fn is_finished(&self) -> bool {
        false
    }
}

const JUMP_TAKEOFF_SPEED: f32 = 2.6;
const BODY_GRAVITY: f32 = 9.81;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoutinePhase {
    Stand { secs: f32 },
    /// Running on the spot: the head bobs sinusoidally.
    Run { secs: f32, cadence_hz: f32, bob: f32 },
    /// Ballistic hop from standing height.
    Jump,
    /// One full squat: down by `depth` and back up over `secs`.
    Squat { secs: f32, depth: f32 },
}

impl RoutinePhase {
    pub fn duration(&self) -> f32 {
        match *self {
            RoutinePhase::Stand { secs } => secs,
            RoutinePhase::Run { secs, .. } => secs,
            RoutinePhase::Jump => 2.0 * JUMP_TAKEOFF_SPEED / BODY_GRAVITY,
            RoutinePhase::Squat { secs, .. } => secs,
        }
    }

    /// Head offset from standing height `t` seconds into the phase.
    fn head_offset(&self, t: f32) -> f32 {
        match *self {
            RoutinePhase::Stand { .. } => 0.0,
            RoutinePhase::Run { cadence_hz, bob, .. } => bob * (2.0 * PI * cadence_hz * t).sin(),
            RoutinePhase::Jump => {
                (JUMP_TAKEOFF_SPEED * t - 0.5 * BODY_GRAVITY * t * t).max(0.0)
            }
            RoutinePhase::Squat { secs, depth } => {
                -depth * 0.5 * (1.0 - (2.0 * PI * t / secs).cos())
            }
        }
    }
}

pub struct ScriptedRoutine {
    phases: Vec<RoutinePhase>,
    standing_height: f32,
    /// Drop every Nth sample to simulate tracking loss.
    dropout_every: Option<u32>,
    elapsed: f32,
    ticks: u64,
}

impl ScriptedRoutine {
    pub fn new(phases: Vec<RoutinePhase>, standing_height: f32) -> Self {
        Self { phases, standing_height, dropout_every: None, elapsed: 0.0, ticks: 0 }
    }

    pub fn with_dropout(mut self, every: Option<u32>) -> Self {
        self.dropout_every = every.filter(|n| *n > 0);
        self
    }

    /// Settle, run, a running jump, a standing jump, three squats.
    pub fn workout(standing_height: f32) -> Self {
        let run = RoutinePhase::Run { secs: 3.0, cadence_hz: 2.5, bob: 0.04 };
        let squat = RoutinePhase::Squat { secs: 2.0, depth: 0.45 };
        Self::new(
            vec![
                RoutinePhase::Stand { secs: 4.0 },
                run,
                RoutinePhase::Jump,
                RoutinePhase::Stand { secs: 1.5 },
                RoutinePhase::Jump,
                RoutinePhase::Stand { secs: 1.0 },
                squat,
                squat,
                squat,
                RoutinePhase::Stand { secs: 1.0 },
                run,
            ],
            standing_height,
        )
    }

    pub fn total_duration(&self) -> f32 {
        self.phases.iter().map(RoutinePhase::duration).sum()
    }

    /// Head height at routine time `t`; standing height once the script ends.
    pub fn head_height_at(&self, t: f32) -> f32 {
        let mut start = 0.0;
        for phase in &self.phases {
            let end = start + phase.duration();
            if t < end {
                return self.standing_height + phase.head_offset(t - start);
            }
            start = end;
        }
        self.standing_height
    }
}

impl LandmarkSource for ScriptedRoutine {
    fn next_sample(&mut self, dt: f32) -> Option<LandmarkSample> {
        self.elapsed += dt.max(0.0);
        self.ticks += 1;
        if let Some(every) = self.dropout_every {
            if self.ticks % every as u64 == 0 {
                return None;
            }
        }
        Some(LandmarkSample::standing_at(self.head_height_at(self.elapsed)))
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.total_duration()
    }
}

/// Drive `source` at `tick_hz`, pushing frames without back-pressure.
///
/// Ticks where the source tracks nobody send nothing; the consumer sees
/// them as missing samples. Returns when the source finishes or the
/// receiver goes away.
pub async fn landmark_loop<S: LandmarkSource>(tx: Sender<LandmarkFrame>, mut source: S, tick_hz: f32) {
    let period = 1.0 / tick_hz.max(1.0);
    let mut ticker = interval(Duration::from_secs_f32(period));
    let mut sent = 0u64;
    let mut dropped = 0u64;

    while !source.is_finished() {
        ticker.tick().await;

        // a tick without a tracked player still sends a frame, so the
        // consumer can tell a dropout from a late frame
        let sample = source.next_sample(period);
        let frame = LandmarkFrame { timestamp: current_timestamp(), sample };
        match tx.try_send(frame) {
            Ok(_) => {
                sent += 1;
                if sent % 300 == 0 {
                    log::debug!("[landmarks] {} frames ({} dropped)", sent, dropped);
                }
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("[landmarks] Channel closed after {} frames", sent);
                return;
            }
            Err(TrySendError::Full(_)) => dropped += 1,
        }
    }
    log::info!("[landmarks] Routine finished: {} frames sent, {} dropped", sent, dropped);
}

/// Consumer side of `landmark_loop` for a loop with its own ticker.
///
/// Takes the freshest frame each tick. When the two timers drift and no
/// frame has arrived yet, the previous frame's sample is reused; only a
/// frame that carries no sample counts as a dropout.
#[derive(Debug, Default)]
pub struct FrameDrain {
    last: Option<LandmarkSample>,
    pub superseded: u64,
    pub reused: u64,
}

impl FrameDrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample for this tick. Returns `None` once the source has finished
    /// and every frame has been consumed.
    pub fn next_tick(&mut self, rx: &mut Receiver<LandmarkFrame>) -> Option<Option<LandmarkSample>> {
        let mut latest: Option<LandmarkFrame> = None;
        loop {
            match rx.try_recv() {
                Ok(frame) => {
                    if latest.is_some() {
                        self.superseded += 1;
                    }
                    latest = Some(frame);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return None;
                    }
                    break;
                }
            }
        }

        match latest {
            Some(frame) => {
                self.last = frame.sample;
                Some(frame.sample)
            }
            None => {
                self.reused += 1;
                Some(self.last)
            }
        }
    }
}
