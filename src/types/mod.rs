pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// One tracked-body snapshot, produced once per tick by the landmark source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSample {
    pub head: Vec3,
    pub left_hand: Vec3,
    pub right_hand: Vec3,
}

impl LandmarkSample {
    pub fn new(head: Vec3, left_hand: Vec3, right_hand: Vec3) -> Self {
        Self { head, left_hand, right_hand }
    }

    /// Sample with only the head placed at height `y`; hands hang at the sides.
    pub fn standing_at(y: f32) -> Self {
        Self {
            head: Vec3::new(0.0, y, 0.0),
            left_hand: Vec3::new(-0.25, y - 0.75, 0.0),
            right_hand: Vec3::new(0.25, y - 0.75, 0.0),
        }
    }

    pub fn head_y(&self) -> f32 {
        self.head.y
    }

    /// False when any coordinate is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.head
            .iter()
            .chain(self.left_hand.iter())
            .chain(self.right_hand.iter())
            .all(|c| c.is_finite())
    }
}
