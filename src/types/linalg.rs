//! Linear algebra aliases for the locomotion pipeline
//!
//! World frame is Y-up, metres. Forward defaults to +Z.

use nalgebra::Vector3;

pub type Vec3 = Vector3<f32>;

/// World up axis.
pub fn up() -> Vec3 {
    Vec3::y()
}

/// Default facing direction before any forward vector is supplied.
pub fn default_forward() -> Vec3 {
    Vec3::z()
}

/// Project `v` onto the horizontal (XZ) plane and normalize.
///
/// Returns `None` when the projection is degenerate (looking straight
/// up or down) or the input is not finite.
pub fn flatten_horizontal(v: &Vec3) -> Option<Vec3> {
    if !v.iter().all(|c| c.is_finite()) {
        return None;
    }
    let flat = Vec3::new(v.x, 0.0, v.z);
    let norm = flat.norm();
    if norm < 1e-4 {
        return None;
    }
    Some(flat / norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flatten_drops_pitch() {
        let pitched = Vec3::new(0.0, -0.8, 0.6);
        let flat = flatten_horizontal(&pitched).unwrap();
        assert_relative_eq!(flat.y, 0.0);
        assert_relative_eq!(flat.z, 1.0);
    }

    #[test]
    fn test_flatten_degenerate() {
        assert!(flatten_horizontal(&Vec3::new(0.0, 1.0, 0.0)).is_none());
        assert!(flatten_horizontal(&Vec3::new(f32::NAN, 0.0, 1.0)).is_none());
    }
}
