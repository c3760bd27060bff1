//! Per-tick body-motion classifiers
//!
//! Each analyzer owns its state outright and reports through returned
//! values; none of them reads another's internals.

pub mod jump;
pub mod run;
pub mod squat;

pub use jump::{JumpAnalyzer, JumpDetected, JumpState};
pub use run::{RunAnalyzer, RunState};
pub use squat::{SquatAnalyzer, SquatPhase, SquatState, SquatTransition};

/// Ticks with a non-positive or non-finite delta carry no velocity information.
pub(crate) fn usable_dt(dt: f32) -> bool {
    dt.is_finite() && dt > 0.0
}
