/// Frame-rate independent exponential smoothing
///
/// Blend weight for a step of `dt` seconds at `rate` (1/s): `1 - e^(-rate * dt)`.
/// Two half steps land on the same value as one full step, so behaviour
/// does not drift when the tick rate changes.
pub fn blend_weight(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Exponential follower with a snap-to-target band
pub struct ExpSmoother {
    value: f32,
    rate: f32,
    snap: f32,
}

impl ExpSmoother {
    /// Create a follower at `initial`, moving at `rate` (1/s), snapping once within `snap`.
    pub fn new(initial: f32, rate: f32, snap: f32) -> Self {
        ExpSmoother { value: initial, rate, snap }
    }

    /// Step towards `target` and return the new value.
    pub fn step(&mut self, target: f32, dt: f32) -> f32 {
        let next = lerp(self.value, target, blend_weight(self.rate, dt));
        self.value = if (next - target).abs() < self.snap { target } else { next };
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self, value: f32) {
        self.value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_blend_weight_bounds() {
        assert_eq!(blend_weight(5.0, 0.0), 0.0);
        let w = blend_weight(5.0, 1.0 / 60.0);
        assert!(w > 0.0 && w < 1.0);
        assert!(blend_weight(5.0, 100.0) <= 1.0);
    }

    #[test]
    fn test_frame_rate_independent() {
        let mut coarse = ExpSmoother::new(0.0, 5.0, 0.0);
        let mut fine = ExpSmoother::new(0.0, 5.0, 0.0);

        coarse.step(1.0, 0.1);
        fine.step(1.0, 0.05);
        fine.step(1.0, 0.05);

        assert_relative_eq!(coarse.value(), fine.value(), epsilon = 1e-5);
    }

    #[test]
    fn test_snap_reaches_target_exactly() {
        let mut smoother = ExpSmoother::new(1.0, 5.0, 1e-3);
        for _ in 0..600 {
            smoother.step(0.0, 1.0 / 60.0);
        }
        assert_eq!(smoother.value(), 0.0);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.2), 0.0);
        assert_eq!(clamp01(f32::NAN), 0.0);
        assert_eq!(clamp01(0.4), 0.4);
    }
}
