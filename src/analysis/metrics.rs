use crate::transform::TransformParams;
use serde::{Deserialize, Serialize};

/// Absolute per-parameter differences between a recovered and an expected transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterErrors {
    /// Wrapped into `[0, 180]`
    pub angle_degrees: f64,
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

/// Acceptance band for a recovered transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub angle_degrees: f64,
    pub scale: f64,
    pub translation_px: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            angle_degrees: 3.0,
            scale: 0.05,
            translation_px: 3.0,
        }
    }
}

impl ParameterErrors {
    pub fn between(recovered: &TransformParams, expected: &TransformParams) -> Self {
        Self {
            angle_degrees: calculate_rotation_error(recovered, expected),
            scale: calculate_scale_error(recovered, expected),
            tx: (recovered.tx - expected.tx).abs(),
            ty: (recovered.ty - expected.ty).abs(),
        }
    }

    pub fn translation_magnitude(&self) -> f64 {
        (self.tx * self.tx + self.ty * self.ty).sqrt()
    }

    pub fn within(&self, tolerance: &Tolerance) -> bool {
        self.angle_degrees <= tolerance.angle_degrees
            && self.scale <= tolerance.scale
            && self.tx <= tolerance.translation_px
            && self.ty <= tolerance.translation_px
    }
}

pub fn calculate_rotation_error(recovered: &TransformParams, expected: &TransformParams) -> f64 {
    let diff = (recovered.angle_degrees() - expected.angle_degrees()).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

pub fn calculate_scale_error(recovered: &TransformParams, expected: &TransformParams) -> f64 {
    (recovered.scale - expected.scale).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_error_wraps() {
        let a = TransformParams::from_degrees(179.0, 1.0, 0.0, 0.0);
        let b = TransformParams::from_degrees(-179.0, 1.0, 0.0, 0.0);
        assert!((calculate_rotation_error(&a, &b) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_within_tolerance() {
        let expected = TransformParams::from_degrees(-15.0, 0.91, -3.0, 19.0);
        let close = TransformParams::from_degrees(-13.5, 0.93, -1.0, 17.5);
        let far = TransformParams::from_degrees(-15.0, 0.91, 2.0, 19.0);

        assert!(ParameterErrors::between(&close, &expected).within(&Tolerance::default()));
        assert!(!ParameterErrors::between(&far, &expected).within(&Tolerance::default()));
    }

    #[test]
    fn test_translation_error_magnitude() {
        let a = TransformParams::new(0.0, 1.0, 3.0, 4.0);
        let b = TransformParams::identity();
        let errors = ParameterErrors::between(&a, &b);
        assert!((errors.translation_magnitude() - 5.0).abs() < 1e-12);
    }
}
