use crate::error::{RegistrationError, Result};
use crate::slice::Image;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Rotation + uniform scale + translation, the search space of the optimizer.
///
/// `angle` is in radians and is never wrapped. `tx`/`ty` are offsets in pixel
/// units along the row and column axes respectively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub angle: f64,
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformParams {
    pub fn new(angle: f64, scale: f64, tx: f64, ty: f64) -> Self {
        Self {
            angle,
            scale,
            tx,
            ty,
        }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 1.0, 0.0, 0.0)
    }

    pub fn from_degrees(angle_degrees: f64, scale: f64, tx: f64, ty: f64) -> Self {
        Self::new(angle_degrees.to_radians(), scale, tx, ty)
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle.to_degrees()
    }

    /// Reject parameters the resampler cannot handle: a non-positive scale
    /// makes the linear map singular or reflected.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("angle", self.angle),
            ("scale", self.scale),
            ("tx", self.tx),
            ("ty", self.ty),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RegistrationError::InvalidParameter(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        if self.scale <= 0.0 {
            return Err(RegistrationError::InvalidParameter(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// The 2x2 scaled rotation `[[s·cos, -s·sin], [s·sin, s·cos]]`.
pub fn linear_map(params: &TransformParams) -> [[f64; 2]; 2] {
    let (sin_a, cos_a) = params.angle.sin_cos();
    let s = params.scale;
    [[s * cos_a, -s * sin_a], [s * sin_a, s * cos_a]]
}

/// Parameters whose warp undoes the warp by `params`.
///
/// With `warp` sampling at `M·o + t`, the inverse samples at `M⁻¹·o - M⁻¹·t`,
/// which is again a scaled rotation: angle `-a`, scale `1/s`.
pub fn inverse(params: &TransformParams) -> Result<TransformParams> {
    params.validate()?;

    let inv = TransformParams::new(-params.angle, 1.0 / params.scale, 0.0, 0.0);
    let m = linear_map(&inv);
    let tx = -(m[0][0] * params.tx + m[0][1] * params.ty);
    let ty = -(m[1][0] * params.tx + m[1][1] * params.ty);

    Ok(TransformParams { tx, ty, ..inv })
}

/// Resample `image` through the transform.
///
/// Each output pixel `o = (row, col)` takes the input value at `M·o + (tx, ty)`,
/// interpolated bilinearly. Sample points outside `[0, rows-1] x [0, cols-1]`
/// are filled with `0.0`. The output has the shape of the input.
pub fn warp(image: &Image, params: &TransformParams) -> Result<Image> {
    params.validate()?;

    let (rows, cols) = image.dim();
    let m = linear_map(params);

    let warped = Array2::from_shape_fn((rows, cols), |(row, col)| {
        let (r, c) = (row as f64, col as f64);
        let src_row = m[0][0] * r + m[0][1] * c + params.tx;
        let src_col = m[1][0] * r + m[1][1] * c + params.ty;
        bilinear_sample(image, src_row, src_col)
    });

    Ok(warped)
}

/// Bilinear interpolation with constant zero fill outside the sampling domain
fn bilinear_sample(image: &Image, row: f64, col: f64) -> f64 {
    let (rows, cols) = image.dim();
    let max_row = rows as f64 - 1.0;
    let max_col = cols as f64 - 1.0;

    if !(row >= 0.0 && col >= 0.0 && row <= max_row && col <= max_col) {
        return 0.0;
    }

    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);

    let fr = row - r0 as f64;
    let fc = col - c0 as f64;

    let p00 = image[[r0, c0]];
    let p01 = image[[r0, c1]];
    let p10 = image[[r1, c0]];
    let p11 = image[[r1, c1]];

    p00 * (1.0 - fr) * (1.0 - fc) + p01 * (1.0 - fr) * fc + p10 * fr * (1.0 - fc) + p11 * fr * fc
}
